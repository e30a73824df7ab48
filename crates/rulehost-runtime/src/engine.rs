//! Rhai engine construction from host configuration

use rhai::{
    packages::{Package, StandardPackage},
    Engine,
};
use rulehost_config::HostConfig;

/// Tracing target for `print` and `debug` output produced by scripts.
pub const SCRIPT_LOG_TARGET: &str = "rulehost::script";

pub(crate) fn build_engine(config: &HostConfig) -> Engine {
    let mut engine = Engine::new_raw();
    engine.register_global_module(StandardPackage::new().as_shared_module());

    engine.set_strict_variables(config.strict_variables());
    engine.set_fail_on_invalid_map_property(config.strict_properties());

    engine.set_max_operations(config.max_operations());
    engine.set_max_call_levels(config.max_call_levels());
    engine.set_max_expr_depths(config.max_expr_depth(), config.max_function_expr_depth());
    engine.set_max_string_size(config.max_string_size());
    engine.set_max_map_size(config.max_map_size());

    engine.on_print(|text| tracing::info!(target: SCRIPT_LOG_TARGET, "{}", text));
    engine.on_debug(|text, source, pos| {
        tracing::debug!(target: SCRIPT_LOG_TARGET, source = ?source, line = ?pos.line(), "{}", text)
    });

    engine
}
