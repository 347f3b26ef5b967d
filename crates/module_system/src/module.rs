//! The capability interface every module entry type implements.

use crate::error::ModuleSystemError;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Lifecycle hooks of a loaded module.
///
/// Hooks run while the registry lock is held. A hook must not call back into
/// the registry; a module that wants another module loaded or unloaded has
/// to queue that request and act on it outside the hook.
pub trait Module: Send {
    /// Called once after the module has been registered as loaded.
    fn enable(&mut self) -> Result<(), ModuleSystemError>;

    /// Called once before the module's boundary is released.
    fn disable(&mut self) -> Result<(), ModuleSystemError>;

    /// Whether the module may be unloaded by a bulk reload.
    fn is_reloadable(&self) -> bool {
        true
    }
}

/// Constructor resolved behind an isolation boundary.
pub type ModuleFactory = fn() -> Box<dyn Module>;

/// Signature of the constructor symbol exported by native modules.
pub type NativeModuleConstructor = unsafe extern "C" fn() -> *mut dyn Module;

/// Runs a hook, turning a panic into a `Hook` error.
pub(crate) fn guarded_hook<F>(module_name: &str, hook: &str, call: F) -> Result<(), ModuleSystemError>
where
    F: FnOnce() -> Result<(), ModuleSystemError>,
{
    match catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result,
        Err(panic_info) => {
            let message = if let Some(s) = panic_info.downcast_ref::<&str>() {
                s.to_string()
            } else if let Some(s) = panic_info.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            Err(ModuleSystemError::Hook(format!(
                "Module {module_name} panicked in {hook}: {message}"
            )))
        }
    }
}

/// Exports a module constructor from a `cdylib` module crate.
///
/// The symbol name is the `main` entry of the module's manifest.
///
/// ```ignore
/// module_system::export_module!(create_greeter, GreeterModule::new);
/// ```
#[macro_export]
macro_rules! export_module {
    ($symbol:ident, $constructor:expr) => {
        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub unsafe extern "C" fn $symbol() -> *mut dyn $crate::Module {
            // Unwinding across the FFI boundary is undefined behavior.
            match ::std::panic::catch_unwind(::std::panic::AssertUnwindSafe(|| {
                let module: Box<dyn $crate::Module> = Box::new($constructor());
                Box::into_raw(module)
            })) {
                Ok(module) => module,
                Err(_) => ::std::ptr::null_mut::<$crate::NullModule>() as *mut dyn $crate::Module,
            }
        }
    };
}

/// Placeholder type used to build a typed null pointer in [`export_module!`].
#[doc(hidden)]
pub struct NullModule;

impl Module for NullModule {
    fn enable(&mut self) -> Result<(), ModuleSystemError> {
        Ok(())
    }

    fn disable(&mut self) -> Result<(), ModuleSystemError> {
        Ok(())
    }
}
