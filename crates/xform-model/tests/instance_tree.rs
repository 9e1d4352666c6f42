use pretty_assertions::assert_eq;

use xform_model::{
    AnswerValue, DataInstance, DataType, ModelError, Multiplicity, TreeElement, TreeReference,
};

fn household(members: usize) -> DataInstance {
    let member = |i: usize| {
        TreeElement::group(
            "member",
            vec![
                TreeElement::leaf("name", DataType::Text).with_value(format!("m{i}")),
                TreeElement::leaf("age", DataType::Integer),
            ],
        )
        .into_repeat_instance(i)
    };
    let mut children = vec![
        TreeElement::leaf("village", DataType::Text),
        TreeElement::group(
            "member",
            vec![
                TreeElement::leaf("name", DataType::Text),
                TreeElement::leaf("age", DataType::Integer),
            ],
        )
        .into_template(),
    ];
    children.extend((0..members).map(member));
    DataInstance::new(TreeElement::group("hh", children))
}

#[test]
fn expand_returns_concrete_refs_in_document_order() {
    let inst = household(3);
    let generic = TreeReference::path("/hh/member/name").genericize();
    let names: Vec<String> = inst
        .expand_reference(&generic)
        .iter()
        .map(|r| inst.resolve_reference(r).unwrap().string_value())
        .collect();
    assert_eq!(names, vec!["m0", "m1", "m2"]);
}

#[test]
fn expand_of_concrete_ref_is_itself_when_present() {
    let inst = household(1);
    let r = TreeReference::path("/hh/village");
    assert_eq!(inst.expand_reference(&r), vec![r]);
    assert!(inst
        .expand_reference(&TreeReference::path("/hh/member[4]"))
        .is_empty());
}

#[test]
fn template_is_found_for_unmaterialized_instances() {
    let inst = household(0);
    let template = inst
        .get_template(&TreeReference::path("/hh/member[5]"))
        .unwrap();
    assert!(template.is_template());
    assert!(inst.get_template(&TreeReference::path("/hh/village")).is_none());
}

#[test]
fn removing_middle_instance_then_renumbering() {
    let mut inst = household(3);
    inst.remove_node(&TreeReference::path("/hh/member[1]")).unwrap();
    inst.resolve_reference_mut(&TreeReference::path("/hh"))
        .unwrap()
        .shift_multiplicities_down("member", 1);

    let hh = inst.resolve_reference(&TreeReference::path("/hh")).unwrap();
    assert_eq!(hh.child_multiplicity("member"), 2);
    let survivors: Vec<(Multiplicity, String)> = hh
        .children()
        .iter()
        .filter(|c| c.name() == "member" && !c.is_template())
        .map(|c| (c.multiplicity(), c.string_value()))
        .collect();
    assert_eq!(
        survivors,
        vec![
            (Multiplicity::Index(0), "m0".to_string()),
            (Multiplicity::Index(1), "m2".to_string()),
        ]
    );
}

#[test]
fn remove_missing_node_reports_reference() {
    let mut inst = household(0);
    let r = TreeReference::path("/hh/member[0]");
    assert_eq!(inst.remove_node(&r), Err(ModelError::NodeNotFound(r)));
}

#[test]
fn set_answer_reports_change() {
    let mut inst = household(1);
    let age = inst
        .resolve_reference_mut(&TreeReference::path("/hh/member/age"))
        .unwrap();
    assert!(age.set_answer(Some(AnswerValue::Integer(4))).unwrap());
    assert!(!age.set_answer(Some(AnswerValue::Integer(4))).unwrap());
    assert!(age.set_answer(None).unwrap());
}

#[test]
fn instance_round_trips_through_json() {
    let inst = household(2);
    let json = serde_json::to_string(&inst).unwrap();
    let back: DataInstance = serde_json::from_str(&json).unwrap();
    assert_eq!(back, inst);
}
