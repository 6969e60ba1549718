//! The kernel backend seam.
//!
//! Lowering an assignment into executable loops and running the result is
//! a collaborator concern behind [`KernelBackend`]: the tensor lifecycle
//! lowers its assignment into named functions, registers them with the
//! backend's module, compiles the module once, and invokes functions by
//! name with raw wire-format tensor arguments.

use std::any::Any;
use std::rc::Rc;

use anyhow::Result;
use tensalg_ir::Assignment;

use crate::ffi::RawTensor;

/// What a lowered function is allowed to do. Passing both fuses assembly
/// into the compute kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    /// Build the output's index arrays.
    Assemble,
    /// Fill the output's values.
    Compute,
}

/// A handle to a lowered function: a name for invocation plus an opaque
/// backend payload.
#[derive(Clone)]
pub struct FuncHandle {
    name: String,
    payload: Rc<dyn Any>,
}

impl FuncHandle {
    pub fn new(name: &str, payload: Rc<dyn Any>) -> FuncHandle {
        FuncHandle {
            name: name.to_string(),
            payload,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The backend payload, downcast to the backend's own type.
    pub fn payload<T: 'static>(&self) -> Option<Rc<T>> {
        Rc::clone(&self.payload).downcast::<T>().ok()
    }
}

impl std::fmt::Debug for FuncHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FuncHandle").field("name", &self.name).finish()
    }
}

/// A backend that lowers assignments to executable functions and runs
/// them over wire-format tensors.
pub trait KernelBackend {
    /// Lowers the assembly function of an assignment.
    fn lower_assemble(
        &mut self,
        stmt: &Assignment,
        name: &str,
        props: &[Property],
        alloc_size: usize,
    ) -> Result<FuncHandle>;

    /// Lowers the compute function of an assignment.
    fn lower_compute(
        &mut self,
        stmt: &Assignment,
        name: &str,
        props: &[Property],
        alloc_size: usize,
    ) -> Result<FuncHandle>;

    /// Registers a lowered function with the backend's module.
    fn add_function(&mut self, func: FuncHandle) -> Result<()>;

    /// Compiles every registered function.
    fn compile_module(&mut self) -> Result<()>;

    /// Invokes a compiled function. `args` is the result tensor followed
    /// by the operand tensors in rhs discovery order.
    fn invoke(&mut self, name: &str, args: &mut [*mut RawTensor]) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_func_handle_payload_downcast() {
        let handle = FuncHandle::new("compute", Rc::new(42u32));
        assert_eq!(handle.name(), "compute");
        assert_eq!(*handle.payload::<u32>().unwrap(), 42);
        assert!(handle.payload::<String>().is_none());
    }
}
