use super::*;

fn config() -> OptionalContentConfig {
    OptionalContentConfig::new()
        .with_group("on1", true)
        .with_group("on2", true)
        .with_group("off1", false)
}

fn ocmd(ids: &[&str], policy: Option<OcPolicy>) -> OcDescriptor {
    OcDescriptor::Membership {
        ids: ids.iter().map(|s| s.to_string()).collect(),
        policy,
        expression: None,
    }
}

#[test]
fn empty_config_shows_everything() {
    let cfg = OptionalContentConfig::new();
    assert!(cfg.is_visible(&OcDescriptor::Group {
        id: "anything".into()
    }));
}

#[test]
fn single_groups_and_missing_ids() {
    let cfg = config();
    assert!(cfg.is_visible(&OcDescriptor::Group { id: "on1".into() }));
    assert!(!cfg.is_visible(&OcDescriptor::Group { id: "off1".into() }));
    assert!(cfg.is_visible(&OcDescriptor::Group {
        id: "missing".into()
    }));
}

#[test]
fn membership_policies() {
    let cfg = config();
    assert!(cfg.is_visible(&ocmd(&["on1", "off1"], None)));
    assert!(cfg.is_visible(&ocmd(&["on1", "off1"], Some(OcPolicy::AnyOn))));
    assert!(!cfg.is_visible(&ocmd(&["on1", "off1"], Some(OcPolicy::AllOn))));
    assert!(cfg.is_visible(&ocmd(&["on1", "on2"], Some(OcPolicy::AllOn))));
    assert!(cfg.is_visible(&ocmd(&["on1", "off1"], Some(OcPolicy::AnyOff))));
    assert!(!cfg.is_visible(&ocmd(&["on1", "on2"], Some(OcPolicy::AnyOff))));
    assert!(!cfg.is_visible(&ocmd(&["on1", "off1"], Some(OcPolicy::AllOff))));
    assert!(cfg.is_visible(&ocmd(&["off1"], Some(OcPolicy::AllOff))));
    assert!(!cfg.is_visible(&ocmd(&["off1"], Some(OcPolicy::AnyOn))));
}

#[test]
fn expressions_take_precedence() {
    let cfg = config();
    let expr: VisibilityExpr =
        serde_json::from_str(r#"["And", "on1", ["Not", "off1"]]"#).unwrap();
    let desc = OcDescriptor::Membership {
        ids: vec!["off1".into()],
        policy: Some(OcPolicy::AllOn),
        expression: Some(expr),
    };
    assert!(cfg.is_visible(&desc));

    let or_expr: VisibilityExpr = serde_json::from_str(r#"["Or", "off1", "off1"]"#).unwrap();
    assert!(!cfg.is_visible(&OcDescriptor::Membership {
        ids: vec![],
        policy: None,
        expression: Some(or_expr),
    }));

    let short: VisibilityExpr = serde_json::from_str(r#"["And"]"#).unwrap();
    assert!(cfg.is_visible(&OcDescriptor::Membership {
        ids: vec![],
        policy: None,
        expression: Some(short),
    }));
}

#[test]
fn descriptors_parse_from_json() {
    let d: OcDescriptor = serde_json::from_str(r#"{"type": "OCG", "id": "on1"}"#).unwrap();
    assert_eq!(d, OcDescriptor::Group { id: "on1".into() });
    let m: OcDescriptor =
        serde_json::from_str(r#"{"type": "OCMD", "ids": ["a"], "policy": "AllOff"}"#).unwrap();
    assert!(matches!(
        m,
        OcDescriptor::Membership {
            policy: Some(OcPolicy::AllOff),
            ..
        }
    ));
}

#[test]
fn marked_content_requires_every_level_visible() {
    let mut s = MarkedContentStack::default();
    assert!(s.all_visible());
    s.push(true);
    s.push(false);
    assert!(!s.all_visible());
    s.pop();
    assert!(s.all_visible());
}
