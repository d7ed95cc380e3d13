//! Fault taxonomy and the trap invoker.
//!
//! The execution pipeline raises a [`Fault`] the moment it detects an
//! abnormal event and hands it to [`Fault::invoke`] together with the
//! execution context and the faulting instruction. Dispatch either mutates
//! the context (delegated trap, breakpoint, host syscall) or aborts the run
//! with a [`Fatal`] diagnostic. A fault is consumed exactly once and never
//! persisted.

pub mod delegate;

use log::info;
use thiserror::Error;

use crate::csr::{Csr, INTERRUPT_BIT, causes, mstatus};
use crate::hart::{Context, SYSCALL_NUM_REG};
use crate::{Mode, SimConfig, Vectoring};

use self::delegate::{TrapKind, TrapRegs};

/// Handle to the faulting instruction, as handed over by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instr(u32);

impl Instr {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw instruction word.
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Encoding width in bytes (2 for compressed encodings).
    pub fn width(self) -> u64 {
        if self.0 & 0b11 == 0b11 { 4 } else { 2 }
    }
}

/// A trap cause, tagged with whether it is an interrupt.
///
/// Exceptions and interrupts share the numeric code space; the tag becomes
/// the high interrupt flag when the cause is materialized into a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapCause {
    Exception(u64),
    Interrupt(u64),
}

impl TrapCause {
    /// The value written into a cause register.
    pub fn value(self) -> u64 {
        match self {
            TrapCause::Exception(code) => code,
            TrapCause::Interrupt(code) => INTERRUPT_BIT | code,
        }
    }

    /// The cause code without the interrupt flag.
    pub fn code(self) -> u64 {
        match self {
            TrapCause::Exception(code) | TrapCause::Interrupt(code) => code,
        }
    }

    fn kind(self) -> TrapKind {
        match self {
            TrapCause::Exception(_) => TrapKind::Exception,
            TrapCause::Interrupt(_) => TrapKind::Interrupt,
        }
    }
}

/// One abnormal control-flow event.
///
/// A closed set; every variant carries all of its payload at construction
/// and is immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Power-on or full-machine re-initialization.
    Reset,
    /// Catch-all event carrying nothing but a name; aborts in simplified
    /// mode.
    Generic { name: &'static str },
    /// The decoder could not make sense of the instruction word.
    UnknownInstruction { inst: u32 },
    /// The instruction decoded but is illegal in the current state.
    IllegalInstruction { inst: u32, reason: String },
    /// A recognized instruction the simulator does not implement.
    UnimplementedInstruction { mnemonic: String },
    /// Reserved floating-point rounding-mode encoding.
    IllegalRoundingMode { frm: u8 },
    /// Debugger-visible halt request.
    Breakpoint,
    /// Environment call from user code.
    SystemCall,
    /// Asynchronous interrupt with cause code `0..=11`.
    Interrupt { code: u64 },
}

impl Fault {
    /// Stable display name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Fault::Reset => "reset",
            Fault::Generic { name } => name,
            Fault::UnknownInstruction { .. } => "unknown instruction",
            Fault::IllegalInstruction { .. } => "illegal instruction",
            Fault::UnimplementedInstruction { .. } => "unimplemented instruction",
            Fault::IllegalRoundingMode { .. } => "illegal rounding mode",
            Fault::Breakpoint => "breakpoint",
            Fault::SystemCall => "system call",
            Fault::Interrupt { .. } => "interrupt",
        }
    }

    /// The fixed variant-to-cause mapping of the ISA contract.
    ///
    /// `Reset` and `Generic` report the all-zero "unknown cause" code; they
    /// are never delegated.
    pub fn cause(&self) -> TrapCause {
        match self {
            Fault::Reset | Fault::Generic { .. } => TrapCause::Exception(0),
            Fault::UnknownInstruction { .. }
            | Fault::IllegalInstruction { .. }
            | Fault::UnimplementedInstruction { .. }
            | Fault::IllegalRoundingMode { .. } => {
                TrapCause::Exception(causes::ILLEGAL_INSTRUCTION)
            }
            Fault::Breakpoint => TrapCause::Exception(causes::BREAKPOINT),
            Fault::SystemCall => TrapCause::Exception(causes::ECALL_U),
            Fault::Interrupt { code } => {
                debug_assert!(*code < causes::NUM_INTERRUPT_CODES);
                TrapCause::Interrupt(*code)
            }
        }
    }

    /// Simplified-mode reaction: diagnose, break, or host-emulate.
    ///
    /// `Reset` and `Interrupt` never reach this path; [`Fault::invoke`]
    /// routes them before it falls through here.
    pub fn invoke_se(&self, ctx: &mut impl Context, _inst: Instr) -> Result<(), Fatal> {
        match self {
            Fault::UnknownInstruction { inst } => Err(Fatal::UnknownInstruction {
                inst: *inst,
                pc: ctx.pc(),
            }),
            Fault::IllegalInstruction { inst, reason } => Err(Fatal::IllegalInstruction {
                inst: *inst,
                pc: ctx.pc(),
                reason: reason.clone(),
            }),
            Fault::UnimplementedInstruction { mnemonic } => Err(Fatal::UnimplementedInstruction {
                mnemonic: mnemonic.clone(),
                pc: ctx.pc(),
            }),
            Fault::IllegalRoundingMode { frm } => Err(Fatal::IllegalRoundingMode {
                frm: *frm,
                pc: ctx.pc(),
            }),
            Fault::Breakpoint => {
                ctx.sched_break(0);
                Ok(())
            }
            Fault::SystemCall => {
                let num = ctx.reg(SYSCALL_NUM_REG);
                // A fault coming back from the host call is ignored in
                // simplified mode.
                let _ = ctx.syscall(num);
                Ok(())
            }
            _ => Err(Fatal::Fault {
                name: self.name(),
                pc: ctx.pc(),
            }),
        }
    }

    /// Dispatches this fault against `ctx` under the given configuration.
    ///
    /// Returns only by completing the state transition or by aborting the
    /// run with a fatal diagnostic. In simplified mode the generic path is
    /// diagnose-and-continue: after the per-variant reaction the pc is
    /// advanced past the faulting instruction as a normal retirement would,
    /// never to a trap vector.
    pub fn invoke(&self, cfg: &SimConfig, ctx: &mut impl Context, inst: Instr) -> Result<(), Fatal> {
        match (cfg.mode, self) {
            (_, Fault::Reset) => {
                reset(cfg, ctx);
                Ok(())
            }
            (Mode::System, Fault::SystemCall | Fault::Interrupt { .. }) => {
                take_trap(cfg, ctx, self.name(), self.cause());
                Ok(())
            }
            (Mode::Process, Fault::Interrupt { .. }) => {
                Err(Fatal::RequiresFullSystem("interrupt delegation"))
            }
            (Mode::System, _) => Err(Fatal::NoSystemHandler(self.name())),
            (Mode::Process, _) => {
                self.invoke_se(ctx, inst)?;
                let next = ctx.pc().wrapping_add(inst.width());
                ctx.set_pc(next);
                Ok(())
            }
        }
    }
}

/// Fatal dispatch outcome; the run loop that owns the engine prints it and
/// halts. Never recovered, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Fatal {
    #[error("fault {name} encountered at pc 0x{pc:016x}")]
    Fault { name: &'static str, pc: u64 },

    #[error("unknown instruction 0x{inst:08x} at pc 0x{pc:016x}")]
    UnknownInstruction { inst: u32, pc: u64 },

    #[error("illegal instruction 0x{inst:08x} at pc 0x{pc:016x}: {reason}")]
    IllegalInstruction { inst: u32, pc: u64, reason: String },

    #[error("unimplemented instruction {mnemonic} at pc 0x{pc:016x}")]
    UnimplementedInstruction { mnemonic: String, pc: u64 },

    #[error("illegal floating-point rounding mode 0x{frm:x} at pc 0x{pc:016x}")]
    IllegalRoundingMode { frm: u8, pc: u64 },

    #[error("{0} requires full-system mode")]
    RequiresFullSystem(&'static str),

    #[error("full-system delegation not implemented for fault {0}")]
    NoSystemHandler(&'static str),
}

/// Full privilege delegation: cause, epc, status save, vector redirect.
///
/// cause, epc, and mstatus are durably updated before the pc is redirected;
/// a mid-trap observer (single-stepping debugger) never sees the new pc
/// with stale cause/epc.
fn take_trap(cfg: &SimConfig, ctx: &mut impl Context, name: &str, cause: TrapCause) {
    let level = delegate::resolve(ctx, cause.kind(), cause.code());
    let regs = TrapRegs::for_level(level);

    ctx.write_csr(regs.cause, cause.value());
    let epc = ctx.pc();
    ctx.write_csr(regs.epc, epc);

    // Trap entry stacks the interrupt-enable bit: MPIE <- MIE, MIE <- 0.
    let status = ctx.read_csr(Csr::Mstatus);
    let mut next = status & !(mstatus::MIE | mstatus::MPIE);
    if status & mstatus::MIE != 0 {
        next |= mstatus::MPIE;
    }
    ctx.write_csr(Csr::Mstatus, next);

    info!(
        "{name}: {} = {:#x}",
        regs.epc.name(),
        ctx.read_csr_raw(regs.epc)
    );

    let tvec = match cfg.vectoring {
        Vectoring::MachineOnly => Csr::Mtvec,
        Vectoring::PerLevel => regs.tvec,
    };
    let target = ctx.read_csr(tvec);
    ctx.set_pc(target);
}

/// Terminal action of a power-on/reset event.
fn reset(cfg: &SimConfig, ctx: &mut impl Context) {
    if cfg.mode == Mode::System {
        ctx.clear_interrupts();
        ctx.clear_arch_regs();
        // Raw read-modify-write: clearing the enables must not itself trap
        // or run any register hook.
        let status = ctx.read_csr_raw(Csr::Mstatus);
        ctx.write_csr_raw(Csr::Mstatus, status & !(mstatus::MIE | mstatus::MPRV));
    }

    // Implementation-defined reset vector, queried from the platform model.
    ctx.set_pc(cfg.reset_vector);
}
