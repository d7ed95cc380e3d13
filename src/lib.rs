//! Trap dispatch and privilege delegation for a RISC-V simulator core.
//!
//! The execution pipeline raises a [`Fault`] when it hits an abnormal event
//! (illegal opcode, breakpoint, environment call, interrupt, reset) and
//! hands it to [`Fault::invoke`] with the hart state and a [`SimConfig`].
//! Depending on the configured [`Mode`], dispatch either reports the event
//! as a fatal diagnostic and steps past it (single-process emulation) or
//! performs full privilege delegation: cause and exception-pc capture,
//! interrupt-enable save, and trap-vector redirection (full-system
//! emulation).
//!
//! ```
//! use riscv_trap::{Fault, Hart, Instr, SimConfig};
//! use riscv_trap::csr::causes;
//!
//! let cfg = SimConfig::full_system(0x8000_0000);
//! let mut hart = Hart::new();
//! hart.pc = 0x8000_1234;
//! hart.csrs.mtvec = 0x8000_0100;
//!
//! // Machine timer interrupt, no delegation bits set: lands at M-level.
//! let fault = Fault::Interrupt { code: causes::MTI };
//! fault.invoke(&cfg, &mut hart, Instr::new(0x0000_0013)).unwrap();
//!
//! assert_eq!(hart.csrs.mepc, 0x8000_1234);
//! assert_eq!(hart.pc, 0x8000_0100);
//! ```

pub mod csr;
pub mod fault;
pub mod hart;

pub use fault::{Fatal, Fault, Instr};
pub use hart::{Context, Hart, SyscallHandler};

/// Which flavor of simulation the engine is serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A single user-level process with host-mediated system calls and no
    /// simulated privileged trap handler.
    Process,
    /// A complete machine with privileged trap handling and delegation.
    System,
}

/// Trap-vector selection for delegated traps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Vectoring {
    /// Always redirect to mtvec, whatever level the trap delegates to.
    /// Default; matches the behavior this engine was modeled on.
    #[default]
    MachineOnly,
    /// Redirect to the destination level's own trap vector (stvec/utvec
    /// for delegated traps).
    PerLevel,
}

/// Per-run configuration, threaded explicitly into every dispatch.
///
/// Dispatch is a function of (fault, context, config); there is no ambient
/// mode state.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub mode: Mode,
    pub vectoring: Vectoring,
    /// Implementation-defined reset vector. Owned by the platform model and
    /// queried, not computed, by the trap engine.
    pub reset_vector: u64,
}

impl SimConfig {
    /// Simplified single-process emulation.
    pub fn process() -> Self {
        Self {
            mode: Mode::Process,
            vectoring: Vectoring::default(),
            reset_vector: 0,
        }
    }

    /// Full-system emulation with the platform's reset vector.
    pub fn full_system(reset_vector: u64) -> Self {
        Self {
            mode: Mode::System,
            vectoring: Vectoring::default(),
            reset_vector,
        }
    }
}
