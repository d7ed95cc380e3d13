//! Privilege delegation: deciding which level a trap lands at.

use crate::csr::{Csr, PrivMode};
use crate::hart::Context;

/// Whether a cause code names a synchronous exception or an interrupt.
///
/// The two share one numeric space; the destination is looked up in the
/// exception- or interrupt-delegation registers accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapKind {
    Exception,
    Interrupt,
}

/// Cause/epc/tvec register triple for one privilege level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapRegs {
    pub cause: Csr,
    pub epc: Csr,
    pub tvec: Csr,
}

impl TrapRegs {
    pub fn for_level(level: PrivMode) -> Self {
        match level {
            PrivMode::Machine => Self {
                cause: Csr::Mcause,
                epc: Csr::Mepc,
                tvec: Csr::Mtvec,
            },
            PrivMode::Supervisor => Self {
                cause: Csr::Scause,
                epc: Csr::Sepc,
                tvec: Csr::Stvec,
            },
            PrivMode::User => Self {
                cause: Csr::Ucause,
                epc: Csr::Uepc,
                tvec: Csr::Utvec,
            },
        }
    }
}

/// Resolves the destination privilege level for cause code `code`.
///
/// Two-step cascade, not a single lookup: bit `code` of the machine-level
/// delegation register pushes the trap down to supervisor level, and bit
/// `code` of the supervisor-level register pushes it down once more to user
/// level. A clear machine bit lands the trap at machine level no matter
/// what the supervisor register holds.
pub fn resolve(ctx: &mut impl Context, kind: TrapKind, code: u64) -> PrivMode {
    let (mdeleg, sdeleg) = match kind {
        TrapKind::Exception => (Csr::Medeleg, Csr::Sedeleg),
        TrapKind::Interrupt => (Csr::Mideleg, Csr::Sideleg),
    };

    if ctx.read_csr(mdeleg) & (1 << code) == 0 {
        return PrivMode::Machine;
    }
    if ctx.read_csr(sdeleg) & (1 << code) == 0 {
        PrivMode::Supervisor
    } else {
        PrivMode::User
    }
}
