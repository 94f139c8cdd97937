// CUDA context management using cust.
// One process-global context: device, stream and the loaded kernel modules.

use super::kernels;
use crate::device::Device;
use crate::error::Error;
use cust::context::{Context, CurrentContext};
use cust::function::Function;
use cust::module::Module;
use cust::stream::{Stream, StreamFlags};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Once};

pub struct CudaContext {
    pub(crate) _context: Context,
    ordinal: u32,
    stream: Stream,
    modules: HashMap<String, Arc<Module>>,
    kernels: HashMap<String, Function<'static>>,
}

lazy_static! {
    static ref GLOBAL_CUDA_CONTEXT: Mutex<Option<Arc<CudaContext>>> = Mutex::new(None);
    static ref CUDA_INIT: Once = Once::new();
}

impl CudaContext {
    fn new(ordinal: u32) -> Result<Self, Error> {
        cust::init(cust::CudaFlags::empty())?;
        let device = cust::device::Device::get_device(ordinal)?;
        let context = Context::new(device)?;
        let stream = Stream::new(StreamFlags::DEFAULT, None)?;

        let mut instance = Self {
            _context: context,
            ordinal,
            stream,
            modules: HashMap::new(),
            kernels: HashMap::new(),
        };

        for (name, ptx, expected_kernels) in kernels::MODULES {
            instance.load_kernel_module(name, ptx, expected_kernels)?;
        }
        debug_println!(
            "Loaded kernels: {:?}",
            instance.kernels.keys().collect::<Vec<_>>()
        );
        Ok(instance)
    }

    fn load_kernel_module(
        &mut self,
        name: &str,
        ptx: &str,
        expected_kernels: &[&str],
    ) -> Result<(), Error> {
        debug_println!("Loading kernel module: {}", name);
        CurrentContext::set_current(&self._context)?;

        let module = Module::from_ptx(ptx, &[])
            .map_err(|e| Error::CudaError(format!("Failed to load module {}: {}", name, e)))?;
        let arc_module = Arc::new(module);

        for &kernel_name in expected_kernels {
            let func = arc_module.get_function(kernel_name).map_err(|e| {
                Error::CudaError(format!(
                    "Failed to load kernel '{}' from module '{}': {}",
                    kernel_name, name, e
                ))
            })?;
            // The module is kept alive in `self.modules` for as long as the function is.
            let static_func =
                unsafe { std::mem::transmute::<Function<'_>, Function<'static>>(func) };
            self.kernels.insert(kernel_name.to_string(), static_func);
        }

        self.modules.insert(name.to_string(), arc_module);
        Ok(())
    }

    pub fn get_stream(&self) -> &Stream {
        &self.stream
    }

    pub fn get_kernel(&self, name: &str) -> Result<&Function<'static>, Error> {
        self.kernels
            .get(name)
            .ok_or_else(|| Error::CudaError(format!("{} not found", name)))
    }
}

impl Drop for CudaContext {
    fn drop(&mut self) {
        debug_println!("Dropping CudaContext");
    }
}

/// Initializes the global context on `device_id`. Only the first call does any work;
/// later calls report whether that first initialization succeeded.
pub fn init_context(device_id: u32) -> Result<(), Error> {
    CUDA_INIT.call_once(|| {
        let mut global_ctx_guard = match GLOBAL_CUDA_CONTEXT.lock() {
            Ok(guard) => guard,
            Err(_) => {
                eprintln!("FATAL: CUDA context mutex was poisoned during initialization");
                return;
            }
        };

        debug_println!("Initializing CUDA context for device {}...", device_id);
        match CudaContext::new(device_id) {
            Ok(context) => {
                *global_ctx_guard = Some(Arc::new(context));
                debug_println!("CUDA context initialization successful.");
            }
            Err(e) => {
                eprintln!("FATAL: Failed to initialize CUDA context: {}", e);
            }
        }
    });

    let final_check_guard = GLOBAL_CUDA_CONTEXT.lock().map_err(|_| {
        Error::InternalLogicError(
            "CUDA context mutex was poisoned after initialization check".to_string(),
        )
    })?;

    if final_check_guard.is_some() {
        Ok(())
    } else {
        Err(Error::CudaError(
            "CUDA context initialization failed or context is not available.".into(),
        ))
    }
}

pub fn get_global_context() -> Result<Arc<CudaContext>, Error> {
    let global_ctx = GLOBAL_CUDA_CONTEXT
        .lock()
        .map_err(|_| Error::InternalLogicError("CUDA context mutex was poisoned".to_string()))?;

    match global_ctx.as_ref() {
        Some(ctx) => Ok(ctx.clone()),
        None => Err(Error::CudaError(
            "CUDA context not initialized. Call init_context first.".into(),
        )),
    }
}

/// The global context for `device`, initializing it on first use and making it current
/// on this thread. Fails with `DeviceUnavailable` when the process context lives on a
/// different ordinal.
pub(crate) fn context_for(device: Device) -> Result<Arc<CudaContext>, Error> {
    let Device::Cuda(ordinal) = device else {
        return Err(Error::InternalLogicError(format!(
            "CUDA context requested for {}",
            device
        )));
    };
    init_context(ordinal)?;
    let context = get_global_context()?;
    if context.ordinal != ordinal {
        return Err(Error::DeviceUnavailable(device));
    }
    CurrentContext::set_current(&context._context)?;
    Ok(context)
}

/// Keeps the global context current on this thread while alive.
pub struct CudaContextGuard {
    _context_arc: Arc<CudaContext>,
}

impl CudaContextGuard {
    pub fn new() -> Result<Self, Error> {
        let context = get_global_context()?;
        CurrentContext::set_current(&context._context).map_err(|e| {
            Error::InternalLogicError(format!("Failed to set current CUDA context: {}", e))
        })?;
        Ok(CudaContextGuard {
            _context_arc: context,
        })
    }
}
