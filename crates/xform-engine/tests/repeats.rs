use chrono::NaiveDate;
use pretty_assertions::assert_eq;

use xform_engine::{BinaryOp, Expr, FormDef, FormError, FormIndex, IndexLevel as L, Triggerable};
use xform_model::{
    AnswerValue, ControlType, DataInstance, DataType, FormElement, GroupDef, ModelError,
    QuestionDef, TreeElement, TreeReference,
};

fn r(path: &str) -> TreeReference {
    TreeReference::path(path)
}

fn question(path: &str) -> FormElement {
    QuestionDef::new(&r(path), ControlType::Input).into()
}

/// `/data/allow`, a repeat `/data/rep` of `{v, double, stamp}` with instances holding
/// `values`, and the summaries `/data/count` and `/data/total`.
fn form(values: &[f64]) -> FormDef {
    let children = vec![
        question("/data/allow"),
        GroupDef::repeat(
            &r("/data/rep"),
            vec![question("/data/rep/v"), question("/data/rep/double")],
        )
        .into(),
        question("/data/count"),
    ];
    let rep = |v: Option<f64>| {
        let mut value = TreeElement::leaf("v", DataType::Decimal);
        if let Some(v) = v {
            value = value.with_value(v);
        }
        TreeElement::group(
            "rep",
            vec![
                value,
                TreeElement::leaf("double", DataType::Decimal),
                TreeElement::leaf("stamp", DataType::DateTime).with_preload("timestamp", "start"),
            ],
        )
    };
    let mut nodes = vec![
        TreeElement::leaf("allow", DataType::Text),
        rep(None).into_template(),
    ];
    nodes.extend(
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| rep(Some(v)).into_repeat_instance(i)),
    );
    nodes.push(TreeElement::leaf("count", DataType::Integer));
    nodes.push(TreeElement::leaf("total", DataType::Decimal));

    let mut form = FormDef::new(1, "repeats", children, DataInstance::new(TreeElement::group("data", nodes)));
    form.set_clock(
        NaiveDate::from_ymd_opt(2023, 5, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap(),
    );
    form.add_triggerable(Triggerable::recalculate(
        Expr::call("count", vec![Expr::path("/data/rep")]),
        &r("/data/count"),
    ));
    form.add_triggerable(Triggerable::recalculate(
        Expr::call("sum", vec![Expr::path("/data/rep/v")]),
        &r("/data/total"),
    ));
    form.add_triggerable(Triggerable::recalculate(
        Expr::binary(BinaryOp::Mul, Expr::path("../v"), Expr::number(2.0)),
        &r("/data/rep/double"),
    ));
    form.add_triggerable(Triggerable::relevance(
        Expr::binary(BinaryOp::Eq, Expr::path("/data/allow"), Expr::string("yes")),
        &r("/data/rep"),
    ));
    form.finalize_triggerables().unwrap();
    form.initialize(false).unwrap();
    form
}

fn value(form: &FormDef, path: &str) -> Option<AnswerValue> {
    form.instance()
        .resolve_reference(&r(path))
        .and_then(|n| n.value().cloned())
}

fn instance_values(form: &FormDef) -> Vec<(String, Option<AnswerValue>)> {
    form.instance()
        .expand_reference(&r("/data/rep/v").genericize())
        .into_iter()
        .map(|rf| {
            let v = form.instance().resolve_reference(&rf).and_then(|n| n.value().cloned());
            (rf.to_string(), v)
        })
        .collect()
}

#[test]
fn initialization_evaluates_every_instance() {
    let form = form(&[2.0, 3.0, 5.0]);
    assert_eq!(value(&form, "/data/count"), Some(AnswerValue::Integer(3)));
    assert_eq!(value(&form, "/data/total"), Some(AnswerValue::Decimal(10.0)));
    assert_eq!(value(&form, "/data/rep[2]/double"), Some(AnswerValue::Decimal(10.0)));
}

#[test]
fn deleting_a_middle_instance_renumbers_the_rest() {
    let mut form = form(&[2.0, 3.0, 5.0]);
    let inside = FormIndex::from_levels([L::repeat(1, 1), L::element(0)]);

    let repeat_index = form.delete_repeat(&inside).unwrap();
    assert_eq!(repeat_index, FormIndex::from_levels([L::repeat(1, 1)]));

    assert_eq!(
        instance_values(&form),
        vec![
            ("/data/rep/v".to_string(), Some(AnswerValue::Decimal(2.0))),
            ("/data/rep[1]/v".to_string(), Some(AnswerValue::Decimal(5.0))),
        ]
    );
    assert!(form.instance().resolve_reference(&r("/data/rep[2]")).is_none());
    assert_eq!(value(&form, "/data/count"), Some(AnswerValue::Integer(2)));
    assert_eq!(value(&form, "/data/total"), Some(AnswerValue::Decimal(7.0)));
}

#[test]
fn creating_an_instance_clones_preloads_and_evaluates_it() {
    let mut form = form(&[4.0]);
    let dest = form
        .create_new_repeat(&FormIndex::from_levels([L::repeat(1, 1)]))
        .unwrap();
    assert_eq!(dest, r("/data/rep[1]"));

    assert_eq!(value(&form, "/data/count"), Some(AnswerValue::Integer(2)));
    assert_eq!(value(&form, "/data/rep[1]/v"), None);
    // An empty input doubles to NaN, which clears a decimal.
    assert_eq!(value(&form, "/data/rep[1]/double"), None);
    assert_eq!(
        value(&form, "/data/rep[1]/stamp"),
        Some(AnswerValue::DateTime(
            NaiveDate::from_ymd_opt(2023, 5, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap()
        ))
    );

    form.set_value(&r("/data/rep[1]/v"), Some(AnswerValue::Decimal(1.5)))
        .unwrap();
    assert_eq!(value(&form, "/data/rep[1]/double"), Some(AnswerValue::Decimal(3.0)));
    assert_eq!(value(&form, "/data/rep/double"), Some(AnswerValue::Decimal(8.0)));
    assert_eq!(value(&form, "/data/total"), Some(AnswerValue::Decimal(5.5)));
}

#[test]
fn creating_over_an_existing_instance_fails() {
    let mut form = form(&[4.0]);
    let err = form
        .create_new_repeat(&FormIndex::from_levels([L::repeat(1, 0)]))
        .unwrap_err();
    assert!(matches!(err, FormError::Model(ModelError::NodeExists(_))));
}

#[test]
fn creating_past_the_next_instance_fails() {
    let mut form = form(&[4.0]);
    let err = form
        .create_new_repeat(&FormIndex::from_levels([L::repeat(1, 5)]))
        .unwrap_err();
    assert!(matches!(
        err,
        FormError::Model(ModelError::MultiplicityGap { next: 1, .. })
    ));
    assert!(form.instance().resolve_reference(&r("/data/rep[5]")).is_none());
    assert_eq!(value(&form, "/data/count"), Some(AnswerValue::Integer(1)));

    // The next free multiplicity still works and is reachable by navigation.
    form.create_new_repeat(&FormIndex::from_levels([L::repeat(1, 1)]))
        .unwrap();
    let nav = form.navigator();
    let mut index = FormIndex::Beginning;
    let mut seen = Vec::new();
    loop {
        index = nav.increment(&index).unwrap();
        if index.is_end() {
            break;
        }
        seen.push(index.to_string());
    }
    assert!(seen.contains(&"1_1, 0".to_string()));
}

#[test]
fn repeat_operations_need_a_repeat() {
    let mut form = form(&[4.0]);
    let allow = FormIndex::from_levels([L::element(0)]);
    assert!(matches!(
        form.delete_repeat(&allow),
        Err(FormError::NotInRepeat(_))
    ));
    assert!(matches!(
        form.create_new_repeat(&allow),
        Err(FormError::NotInRepeat(_))
    ));
}

#[test]
fn repeat_creation_is_gated_by_its_condition() {
    let mut form = form(&[1.0, 2.0]);
    let next = r("/data/rep[2]");
    assert!(!form.can_create_repeat(&next).unwrap());
    assert!(!form.instance().resolve_reference(&r("/data/rep[1]")).unwrap().is_relevant());

    form.set_value(&r("/data/allow"), Some(AnswerValue::Text("yes".into())))
        .unwrap();
    assert!(form.can_create_repeat(&next).unwrap());
    assert!(form.instance().resolve_reference(&r("/data/rep[1]/v")).unwrap().is_relevant());
}
