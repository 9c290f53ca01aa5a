use proptest::prelude::*;
use runway_core::{Environment, Error, ResourceNames};

proptest! {
    #[test]
    fn missing_argument_uses_preview_identity(identity in "[a-z][a-z0-9]{0,15}") {
        let env = Environment::resolve(None, Some(&identity));
        prop_assert_eq!(env.as_str(), format!("preview-{identity}"));
    }

    #[test]
    fn explicit_argument_is_kept_verbatim(name in "[a-z][a-z0-9]{0,10}", identity in "[a-z]{1,8}") {
        let env = Environment::resolve(Some(&name), Some(&identity));
        prop_assert_eq!(env.as_str(), name.as_str());
    }

    #[test]
    fn well_formed_names_validate(name in "[a-z][a-z0-9]{0,8}(-[a-z0-9]{1,8}){0,2}") {
        prop_assert!(Environment::resolve(Some(&name), None).validate().is_ok());
    }

    #[test]
    fn any_uppercase_is_rejected(head in "[a-z]{1,5}", upper in "[A-Z]", tail in "[a-z]{0,5}") {
        let name = format!("{head}{upper}{tail}");
        let result = Environment::resolve(Some(&name), None).validate();
        let is_invalid_env = matches!(result, Err(Error::InvalidEnvironment { .. }));
        prop_assert!(is_invalid_env);
    }

    #[test]
    fn resource_names_never_exceed_service_limit(name in "[a-z][a-z0-9]{0,60}") {
        let env = Environment::resolve(Some(&name), None);
        match ResourceNames::new("app", &env) {
            Ok(names) => prop_assert!(names.stack.len() <= 40),
            Err(e) => {
                let too_long = matches!(e, Error::NameTooLong { .. });
                prop_assert!(too_long);
            }
        }
    }
}

#[test]
fn validation_happens_before_naming() {
    let env = Environment::resolve(Some("Prod"), None);
    let err = ResourceNames::new("app", &env).unwrap_err();
    assert!(matches!(err, Error::InvalidEnvironment { ref name, .. } if name == "Prod"));
}

#[test]
fn parse_validates_explicit_names() {
    assert_eq!(Environment::parse(" staging ").unwrap().as_str(), "staging");
    assert!(matches!(
        Environment::parse("staging-"),
        Err(Error::InvalidEnvironment { .. })
    ));
}
