use pretty_assertions::assert_eq;

use xform_engine::{FormError, FormIndex, IndexLevel as L, Navigator};
use xform_model::{
    ControlType, DataInstance, DataType, FormElement, GroupDef, QuestionDef, TreeElement,
    TreeReference,
};

fn question(path: &str) -> FormElement {
    QuestionDef::new(&TreeReference::path(path), ControlType::Input).into()
}

fn at(levels: &[L]) -> FormIndex {
    FormIndex::from_levels(levels.iter().copied())
}

#[test]
fn single_question_form_walks_there_and_back() {
    let children = vec![question("/data/q")];
    let instance = DataInstance::new(TreeElement::group(
        "data",
        vec![TreeElement::leaf("q", DataType::Text)],
    ));
    let nav = Navigator::new(&children, &instance);

    let q = nav.increment(&FormIndex::Beginning).unwrap();
    assert_eq!(q, at(&[L::element(0)]));
    assert_eq!(nav.increment(&q).unwrap(), FormIndex::End);
    assert_eq!(nav.decrement(&FormIndex::End).unwrap(), q);
    assert_eq!(nav.decrement(&q).unwrap(), FormIndex::Beginning);
    assert_eq!(
        nav.instance_ref(&q).unwrap(),
        Some(TreeReference::path("/data/q"))
    );
}

#[test]
fn sentinels_are_fixed_points() {
    let children = vec![question("/data/q")];
    let instance = DataInstance::new(TreeElement::group(
        "data",
        vec![TreeElement::leaf("q", DataType::Text)],
    ));
    let nav = Navigator::new(&children, &instance);
    assert_eq!(nav.increment(&FormIndex::End).unwrap(), FormIndex::End);
    assert_eq!(
        nav.decrement(&FormIndex::Beginning).unwrap(),
        FormIndex::Beginning
    );

    let empty: Vec<FormElement> = Vec::new();
    let nav = Navigator::new(&empty, &instance);
    assert_eq!(nav.increment(&FormIndex::Beginning).unwrap(), FormIndex::End);
    assert_eq!(nav.decrement(&FormIndex::End).unwrap(), FormIndex::Beginning);
}

fn survey() -> (Vec<FormElement>, DataInstance) {
    let children = vec![
        question("/data/name"),
        GroupDef::repeat(
            &TreeReference::path("/data/child"),
            vec![question("/data/child/age")],
        )
        .into(),
        question("/data/done"),
    ];
    let child = || TreeElement::group("child", vec![TreeElement::leaf("age", DataType::Integer)]);
    let instance = DataInstance::new(TreeElement::group(
        "data",
        vec![
            TreeElement::leaf("name", DataType::Text),
            child().into_template(),
            child().into_repeat_instance(0),
            child().into_repeat_instance(1),
            TreeElement::leaf("done", DataType::Text),
        ],
    ));
    (children, instance)
}

#[test]
fn forward_walk_visits_each_instance_then_the_add_prompt() {
    let (children, instance) = survey();
    let nav = Navigator::new(&children, &instance);

    let mut seen = Vec::new();
    let mut index = FormIndex::Beginning;
    loop {
        index = nav.increment(&index).unwrap();
        if index.is_end() {
            break;
        }
        seen.push(index.to_string());
    }
    assert_eq!(
        seen,
        vec!["0", "1_0", "1_0, 0", "1_1", "1_1, 0", "1_2", "2"]
    );
}

#[test]
fn backward_walk_lands_in_the_last_existing_instance() {
    let (children, instance) = survey();
    let nav = Navigator::new(&children, &instance);

    let mut seen = Vec::new();
    let mut index = FormIndex::End;
    loop {
        index = nav.decrement(&index).unwrap();
        if index.is_beginning() {
            break;
        }
        seen.push(index.to_string());
    }
    assert_eq!(seen, vec!["2", "1_1, 0", "1_1", "1_0, 0", "1_0", "0"]);
}

#[test]
fn instance_refs_carry_repeat_multiplicities() {
    let (children, instance) = survey();
    let nav = Navigator::new(&children, &instance);

    let age = at(&[L::repeat(1, 1), L::element(0)]);
    assert_eq!(
        nav.instance_ref(&age).unwrap(),
        Some(TreeReference::path("/data/child[1]/age"))
    );
    let labels: Vec<bool> = nav
        .explode(&age)
        .unwrap()
        .iter()
        .map(|e| e.is_repeat())
        .collect();
    assert_eq!(labels, vec![true, false]);
    assert!(nav.child_element(&age).is_some_and(FormElement::is_question));
    assert_eq!(nav.deep_child_count(), 4);

    let err = nav.collapse(&at(&[L::element(7)])).unwrap_err();
    assert!(matches!(err, FormError::InvalidIndex(_)));
}

#[test]
fn empty_repeat_is_stepped_over_in_both_directions() {
    let (children, _) = survey();
    let instance = DataInstance::new(TreeElement::group(
        "data",
        vec![
            TreeElement::leaf("name", DataType::Text),
            TreeElement::group("child", vec![TreeElement::leaf("age", DataType::Integer)])
                .into_template(),
            TreeElement::leaf("done", DataType::Text),
        ],
    ));
    let nav = Navigator::new(&children, &instance);

    let prompt = nav.increment(&at(&[L::element(0)])).unwrap();
    assert_eq!(prompt, at(&[L::repeat(1, 0)]));
    assert_eq!(nav.increment(&prompt).unwrap(), at(&[L::element(2)]));
    assert_eq!(nav.decrement(&at(&[L::element(2)])).unwrap(), prompt);
}
