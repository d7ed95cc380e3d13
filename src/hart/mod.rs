//! Execution-context capability and the concrete hart behind it.

use log::warn;

use crate::csr::{Csr, CsrFile};
use crate::fault::Fault;

/// General register carrying the system-call number (a7).
pub const SYSCALL_NUM_REG: u8 = 17;

/// Host-side system-call translation, owned by the surrounding simulator.
///
/// Returns a follow-up fault if the call itself traps, or `None` on success.
pub trait SyscallHandler {
    fn syscall(&mut self, num: u64, regs: &mut [u64; 32]) -> Option<Fault>;
}

/// The architectural state a trap dispatch is allowed to touch.
///
/// The engine never owns this state; it receives a `&mut` for the duration
/// of one dispatch and mutates it in place. CSR access comes in two flavors
/// with the same contract as [`CsrFile`]: the plain accessors are
/// architecture-visible (WARL masking applies), the `_raw` ones bypass every
/// mask and side effect.
pub trait Context {
    /// Reads general register `x<idx>`.
    fn reg(&self, idx: u8) -> u64;

    /// Writes general register `x<idx>`. Writes to x0 are discarded.
    fn set_reg(&mut self, idx: u8, value: u64);

    fn pc(&self) -> u64;
    fn set_pc(&mut self, pc: u64);

    fn read_csr(&mut self, csr: Csr) -> u64;
    fn read_csr_raw(&self, csr: Csr) -> u64;
    fn write_csr(&mut self, csr: Csr, value: u64);
    fn write_csr_raw(&mut self, csr: Csr, value: u64);

    /// Performs host system-call translation for call number `num`.
    fn syscall(&mut self, num: u64) -> Option<Fault>;

    /// Requests a scheduling break `delta` cycles from now (debugger hook).
    fn sched_break(&mut self, delta: u64);

    /// Zeroes all general registers (reset).
    fn clear_arch_regs(&mut self);

    /// Clears all pending interrupts for this hart (reset).
    fn clear_interrupts(&mut self);
}

/// One simulated hardware thread: general registers, pc, and trap CSRs.
///
/// Single owner, single writer; the surrounding scheduler serializes access
/// (nothing here suspends or synchronizes).
pub struct Hart {
    pub regs: [u64; 32],
    pub pc: u64,
    pub csrs: CsrFile,
    syscalls: Option<Box<dyn SyscallHandler>>,
    sched_breaks: u64,
}

impl Default for Hart {
    fn default() -> Self {
        Self::new()
    }
}

impl Hart {
    pub fn new() -> Self {
        Self {
            regs: [0; 32],
            pc: 0,
            csrs: CsrFile::new(),
            syscalls: None,
            sched_breaks: 0,
        }
    }

    /// Installs the host system-call handler for this hart.
    pub fn with_syscalls(handler: Box<dyn SyscallHandler>) -> Self {
        Self {
            syscalls: Some(handler),
            ..Self::new()
        }
    }

    /// Returns the number of scheduling-break requests raised since the last
    /// call, and resets the count. Polled by the scheduler/debugger layer.
    pub fn take_sched_breaks(&mut self) -> u64 {
        std::mem::take(&mut self.sched_breaks)
    }
}

impl Context for Hart {
    fn reg(&self, idx: u8) -> u64 {
        self.regs[idx as usize]
    }

    fn set_reg(&mut self, idx: u8, value: u64) {
        if idx != 0 {
            self.regs[idx as usize] = value;
        } // x0 hardwired
    }

    fn pc(&self) -> u64 {
        self.pc
    }

    fn set_pc(&mut self, pc: u64) {
        self.pc = pc;
    }

    fn read_csr(&mut self, csr: Csr) -> u64 {
        self.csrs.read(csr)
    }

    fn read_csr_raw(&self, csr: Csr) -> u64 {
        self.csrs.read_raw(csr)
    }

    fn write_csr(&mut self, csr: Csr, value: u64) {
        self.csrs.write(csr, value);
    }

    fn write_csr_raw(&mut self, csr: Csr, value: u64) {
        self.csrs.write_raw(csr, value);
    }

    fn syscall(&mut self, num: u64) -> Option<Fault> {
        match &mut self.syscalls {
            Some(handler) => handler.syscall(num, &mut self.regs),
            None => {
                warn!("syscall {num} with no handler installed, ignoring");
                None
            }
        }
    }

    fn sched_break(&mut self, _delta: u64) {
        self.sched_breaks += 1;
    }

    fn clear_arch_regs(&mut self) {
        self.regs = [0; 32];
    }

    fn clear_interrupts(&mut self) {
        self.csrs.write_raw(Csr::Mip, 0);
    }
}
