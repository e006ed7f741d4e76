use ferrous_resolve::{DiError, ProviderOptions, Resolver, ResolverMode, ServiceCollection};
use serial_test::serial;
use std::env;

const VARS: [&str; 4] = [
    "FERROUS_RESOLVE_MODE",
    "FERROUS_RESOLVE_VALIDATE_SCOPES",
    "FERROUS_RESOLVE_VALIDATE_ON_BUILD",
    "FERROUS_RESOLVE_PROMOTION_THRESHOLD",
];

fn clear() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_without_environment() {
    clear();
    assert_eq!(ProviderOptions::from_env().unwrap(), ProviderOptions::default());
}

#[test]
#[serial]
fn test_environment_overrides() {
    clear();
    env::set_var("FERROUS_RESOLVE_MODE", "Compiled");
    env::set_var("FERROUS_RESOLVE_VALIDATE_SCOPES", "true");
    env::set_var("FERROUS_RESOLVE_PROMOTION_THRESHOLD", "7");

    let options = ProviderOptions::from_env().unwrap();
    clear();

    assert_eq!(options.mode, ResolverMode::Compiled);
    assert!(options.validate_scopes);
    assert!(!options.validate_on_build);
    assert_eq!(options.promotion.threshold, 7);
}

#[test]
#[serial]
fn test_invalid_values_are_config_errors() {
    clear();
    env::set_var("FERROUS_RESOLVE_MODE", "jit");
    assert!(matches!(ProviderOptions::from_env(), Err(DiError::Config(_))));

    clear();
    env::set_var("FERROUS_RESOLVE_PROMOTION_THRESHOLD", "soon");
    let err = ProviderOptions::from_env().err().expect("threshold must be numeric");
    clear();
    assert!(err.to_string().contains("FERROUS_RESOLVE_PROMOTION_THRESHOLD"));
}

#[test]
#[serial]
fn test_environment_options_drive_the_provider() {
    clear();
    env::set_var("FERROUS_RESOLVE_VALIDATE_SCOPES", "1");
    let options = ProviderOptions::from_env().unwrap();
    clear();

    let mut services = ServiceCollection::new();
    services.add_scoped_factory::<String, _>(|_| "request".to_string());
    let provider = services.build_with_options(options).unwrap();

    assert!(matches!(provider.get::<String>(), Err(DiError::ScopedFromRoot { .. })));
    assert!(provider.create_scope().get::<String>().is_ok());
}
