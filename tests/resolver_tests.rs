//! Dependency resolver integration tests
//!
//! Select / unselect closures, file reference counts, conditional
//! dependencies and parameter edits on the shared fixture tree.

mod common;

use pretty_assertions::assert_eq;

use common::{enabled, Fixture};
use modforge::{DependencyResolver, ForgeError, ParamRef};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Select
// =============================================================================

mod select_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_select_pulls_in_dependency() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        let outcome = DependencyResolver::new(&mut catalog).select("net").unwrap();

        assert_eq!(outcome.module, "net");
        assert_eq!(outcome.auto_enabled, strings(&["kernel"]));
        assert_eq!(enabled(&catalog), strings(&["kernel", "net"]));
        assert!(catalog.is_explicit("net"));
        assert!(!catalog.is_explicit("kernel"));
    }

    #[test]
    fn test_select_is_monotonic() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        let mut resolver = DependencyResolver::new(&mut catalog);
        resolver.select("ser").unwrap();
        let again = resolver.select("ser").unwrap();

        assert!(again.auto_enabled.is_empty());
        assert_eq!(enabled(&catalog), strings(&["ser", "timer"]));
        assert_eq!(catalog.file_ref_count("util.c"), 1);
    }

    #[test]
    fn test_select_cycle_terminates() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        let outcome = DependencyResolver::new(&mut catalog).select("cyc_a").unwrap();
        assert_eq!(outcome.auto_enabled, strings(&["cyc_b"]));
        assert_eq!(enabled(&catalog), strings(&["cyc_a", "cyc_b"]));
    }

    #[test]
    fn test_select_unknown_module() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        let err = DependencyResolver::new(&mut catalog).select("nope").unwrap_err();
        assert!(matches!(err, ForgeError::UnknownModule(name) if name == "nope"));
        assert!(enabled(&catalog).is_empty());
    }

    #[test]
    fn test_set_conditional_dependency_is_followed() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        assert!(catalog.effective_dependencies("foo").contains(&"bar".to_string()));

        let outcome = DependencyResolver::new(&mut catalog).select("foo").unwrap();
        assert_eq!(outcome.auto_enabled, strings(&["bar"]));
        assert_eq!(enabled(&catalog), strings(&["bar", "foo"]));
    }

    #[test]
    fn test_conditional_dependency_on_integer_is_inert() {
        let fixture = Fixture::new();
        fixture.write(
            "cfg/cfg_net.h",
            "/**\n * Maximum sockets.\n * $WIZ$ type = \"int\"; conditional_deps = \"bar\"\n */\n#define CONFIG_NET_SOCKETS 4\n",
        );
        let mut catalog = fixture.catalog();
        let param = catalog.parameter("cfg/cfg_net.h", "CONFIG_NET_SOCKETS").unwrap();
        assert_eq!(param.conditional_deps, strings(&["bar"]));
        assert!(catalog
            .conditional_gates("bar")
            .iter()
            .all(|gate| gate.name != "CONFIG_NET_SOCKETS"));

        let outcome = DependencyResolver::new(&mut catalog).select("net").unwrap();
        assert_eq!(outcome.auto_enabled, strings(&["kernel"]));
        assert!(!catalog.is_enabled("bar"));
    }

    #[test]
    fn test_clear_conditional_dependency_is_ignored() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        assert!(!catalog.effective_dependencies("ser").contains(&"bar".to_string()));
        DependencyResolver::new(&mut catalog).select("ser").unwrap();
        assert!(!catalog.is_enabled("bar"));
    }
}

// =============================================================================
// Unselect
// =============================================================================

mod unselect_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unselect_cascades_to_dependents() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        let mut resolver = DependencyResolver::new(&mut catalog);
        resolver.select("net").unwrap();

        let outcome = resolver.unselect("kernel").unwrap();
        assert_eq!(outcome.disabled, strings(&["net"]));
        assert!(outcome.orphans.is_empty());
        assert!(enabled(&catalog).is_empty());
    }

    #[test]
    fn test_select_then_unselect_restores_after_release() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        let mut resolver = DependencyResolver::new(&mut catalog);
        resolver.select("cyc_a").unwrap();
        let before = enabled(resolver.catalog());

        resolver.select("net").unwrap();
        let outcome = resolver.unselect("net").unwrap();
        assert!(outcome.disabled.is_empty());
        assert_eq!(outcome.orphans, strings(&["kernel"]));
        assert!(resolver.catalog().is_enabled("kernel"));

        resolver.release(&outcome.orphans).unwrap();
        assert_eq!(enabled(&catalog), before);
        assert_eq!(catalog.file_ref_count("util.c"), 0);
    }

    #[test]
    fn test_shared_file_keeps_remaining_reference() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        let mut resolver = DependencyResolver::new(&mut catalog);
        resolver.select("kernel").unwrap();
        resolver.select("ser").unwrap();
        assert_eq!(resolver.catalog().file_ref_count("util.c"), 2);

        let outcome = resolver.unselect("ser").unwrap();
        assert_eq!(outcome.orphans, strings(&["timer"]));
        assert_eq!(catalog.file_ref_count("util.c"), 1);
    }

    #[test]
    fn test_required_dependency_is_not_an_orphan() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        let mut resolver = DependencyResolver::new(&mut catalog);
        resolver.select("net").unwrap();
        resolver.select("kernel").unwrap();

        // kernel was selected directly, so it stays wanted
        let outcome = resolver.unselect("net").unwrap();
        assert!(outcome.orphans.is_empty());
        assert_eq!(enabled(&catalog), strings(&["kernel"]));
    }

    #[test]
    fn test_unselect_cycle_terminates() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        let mut resolver = DependencyResolver::new(&mut catalog);
        resolver.select("cyc_a").unwrap();
        let outcome = resolver.unselect("cyc_a").unwrap();
        assert_eq!(outcome.disabled, strings(&["cyc_b"]));
        assert!(enabled(&catalog).is_empty());
    }

    #[test]
    fn test_conditional_gate_reported_not_applied() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        let mut resolver = DependencyResolver::new(&mut catalog);
        resolver.select("foo").unwrap();

        let outcome = resolver.unselect("bar").unwrap();
        assert!(outcome.disabled.is_empty());
        assert_eq!(
            outcome.unsatisfied_params,
            vec![ParamRef {
                module: "foo".to_string(),
                configuration: "cfg/cfg_foo.h".to_string(),
                name: "CONFIG_FOO".to_string(),
            }]
        );
        // The flag itself is untouched until the caller zeroes it
        assert!(resolver.catalog().is_enabled("foo"));
        assert_eq!(
            resolver.catalog().parameter("cfg/cfg_foo.h", "CONFIG_FOO").unwrap().value,
            "1"
        );

        let change = resolver.zero_parameter(&outcome.unsatisfied_params[0]).unwrap();
        assert_eq!(change.new_value, "0");
        assert!(!catalog.effective_dependencies("foo").contains(&"bar".to_string()));
    }
}

// =============================================================================
// Parameter edits
// =============================================================================

mod parameter_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SER: &str = "cfg/cfg_ser.h";

    #[test]
    fn test_setting_flag_enables_gated_module() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        let mut resolver = DependencyResolver::new(&mut catalog);
        resolver.select("ser").unwrap();

        let change = resolver.set_parameter(SER, "CONFIG_SER_STROBE", "true").unwrap();
        assert_eq!(change.old_value, "0");
        assert_eq!(change.new_value, "1");
        assert_eq!(change.enabled, strings(&["bar"]));
        assert!(resolver.catalog().is_enabled("bar"));
    }

    #[test]
    fn test_clearing_flag_reports_released() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        let mut resolver = DependencyResolver::new(&mut catalog);
        resolver.select("ser").unwrap();
        resolver.set_parameter(SER, "CONFIG_SER_STROBE", "1").unwrap();

        let change = resolver.set_parameter(SER, "CONFIG_SER_STROBE", "off").unwrap();
        assert_eq!(change.released, strings(&["bar"]));
        // Released modules stay enabled until the caller disables them
        assert!(resolver.catalog().is_enabled("bar"));
    }

    #[test]
    fn test_released_skips_modules_still_required() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        let mut resolver = DependencyResolver::new(&mut catalog);
        resolver.select("foo").unwrap();
        resolver.select("ser").unwrap();
        resolver.set_parameter(SER, "CONFIG_SER_STROBE", "1").unwrap();

        let change = resolver.set_parameter(SER, "CONFIG_SER_STROBE", "0").unwrap();
        assert!(change.released.is_empty());
    }

    #[test]
    fn test_flag_on_disabled_module_has_no_effect() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        let change = DependencyResolver::new(&mut catalog)
            .set_parameter(SER, "CONFIG_SER_STROBE", "1")
            .unwrap();
        assert!(change.enabled.is_empty());
        assert!(enabled(&catalog).is_empty());
    }

    #[test]
    fn test_integer_bounds_and_suffix() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        let mut resolver = DependencyResolver::new(&mut catalog);

        let err = resolver
            .set_parameter(SER, "CONFIG_SER_RXTIMEOUT", "300")
            .unwrap_err();
        assert!(matches!(err, ForgeError::InvalidValue { .. }));
        assert!(resolver.set_parameter(SER, "CONFIG_SER_RXTIMEOUT", "ten").is_err());

        let change = resolver.set_parameter(SER, "CONFIG_SER_RXTIMEOUT", "20").unwrap();
        assert_eq!(change.new_value, "20");
        let param = resolver.catalog().parameter(SER, "CONFIG_SER_RXTIMEOUT").unwrap();
        assert_eq!(param.rendered_value(), "20UL");
    }

    #[test]
    fn test_enum_values_checked_against_list() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        let mut resolver = DependencyResolver::new(&mut catalog);

        assert!(resolver.set_parameter(SER, "CONFIG_SER_PORT", "SER_UART7").is_err());
        let change = resolver.set_parameter(SER, "CONFIG_SER_PORT", "SER_UART1").unwrap();
        assert!(change.changed());
    }

    #[test]
    fn test_autoenabled_is_read_only() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        let err = DependencyResolver::new(&mut catalog)
            .set_parameter("cfg/cfg_kernel.h", "CONFIG_KERN", "1")
            .unwrap_err();
        assert!(matches!(err, ForgeError::InvalidValue { .. }));
    }

    #[test]
    fn test_sync_autoenabled_mirrors_module_state() {
        let fixture = Fixture::new();
        let mut catalog = fixture.catalog();
        let mut resolver = DependencyResolver::new(&mut catalog);
        resolver.select("kernel").unwrap();
        assert_eq!(resolver.sync_autoenabled(), 1);
        assert_eq!(resolver.sync_autoenabled(), 0);
        assert_eq!(
            catalog.parameter("cfg/cfg_kernel.h", "CONFIG_KERN").unwrap().value,
            "1"
        );
    }
}
