use cfg_if::cfg_if;
use std::sync::Once;

cfg_if! {
	// When the `console_error_panic_hook` feature is enabled, we can call the
	// `set_panic_hook` function at least once during initialization, and then
	// we will get better error messages if our code ever panics.
	if #[cfg(feature = "console_error_panic_hook")] {
		extern crate console_error_panic_hook;
		pub use self::console_error_panic_hook::set_once as set_panic_hook;
	} else {
		#[inline]
		pub fn set_panic_hook() {}
	}
}

static LOGGING: Once = Once::new();

/// Route `tracing` events to the browser console.
pub fn init_logging() {
	LOGGING.call_once(|| {
		cfg_if! {
			if #[cfg(target_arch = "wasm32")] {
				tracing_wasm::set_as_global_default();
			}
		}
	});
}
