//! Privileged control-and-status registers touched by trap dispatch.

/// Exception and interrupt cause codes (RISC-V Privileged Spec).
pub mod causes {
    pub const INSTRUCTION_ADDRESS_MISALIGNED: u64 = 0;
    pub const INSTRUCTION_ACCESS_FAULT: u64 = 1;
    pub const ILLEGAL_INSTRUCTION: u64 = 2;
    pub const BREAKPOINT: u64 = 3;
    pub const LOAD_ADDRESS_MISALIGNED: u64 = 4;
    pub const LOAD_ACCESS_FAULT: u64 = 5;
    pub const STORE_ADDRESS_MISALIGNED: u64 = 6;
    pub const STORE_ACCESS_FAULT: u64 = 7;
    pub const ECALL_U: u64 = 8;
    pub const ECALL_S: u64 = 9;
    pub const ECALL_M: u64 = 11;

    // Interrupt causes (cause register additionally carries INTERRUPT_BIT)
    pub const USI: u64 = 0;
    pub const SSI: u64 = 1;
    pub const MSI: u64 = 3;
    pub const UTI: u64 = 4;
    pub const STI: u64 = 5;
    pub const MTI: u64 = 7;
    pub const UEI: u64 = 8;
    pub const SEI: u64 = 9;
    pub const MEI: u64 = 11;

    pub const NUM_INTERRUPT_CODES: u64 = 12;
}

/// Interrupt flag in a cause register (RV64).
pub const INTERRUPT_BIT: u64 = 1 << 63;

/// mstatus bit positions shared by the trap and reset paths.
pub mod mstatus {
    pub const SIE: u64 = 1 << 1;
    pub const MIE: u64 = 1 << 3;
    pub const SPIE: u64 = 1 << 5;
    pub const MPIE: u64 = 1 << 7;
    pub const SPP: u64 = 1 << 8;
    pub const MPP: u64 = 0b11 << 11;
    pub const MPRV: u64 = 1 << 17;
    pub const SUM: u64 = 1 << 18;
    pub const MXR: u64 = 1 << 19;

    /// Bits software may change through the architecture-visible accessors.
    pub const WRITABLE: u64 = SIE | MIE | SPIE | MPIE | SPP | MPP | MPRV | SUM | MXR;
}

/// Privilege modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrivMode {
    User = 0,
    Supervisor = 1,
    #[default]
    Machine = 3,
}

impl PrivMode {
    pub fn from_u64(val: u64) -> Option<Self> {
        match val {
            0 => Some(PrivMode::User),
            1 => Some(PrivMode::Supervisor),
            3 => Some(PrivMode::Machine),
            _ => None,
        }
    }
}

/// The named privileged registers this engine reads and writes.
///
/// Discriminants are the architectural CSR addresses, so the mapping stays
/// checkable against the privileged spec. The user-level trap registers are
/// the N-extension ones, which delegation can land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Csr {
    // User trap setup / handling
    Utvec = 0x005,
    Uepc = 0x041,
    Ucause = 0x042,

    // Supervisor trap setup / handling
    Sedeleg = 0x102,
    Sideleg = 0x103,
    Stvec = 0x105,
    Sepc = 0x141,
    Scause = 0x142,

    // Machine trap setup / handling
    Mstatus = 0x300,
    Medeleg = 0x302,
    Mideleg = 0x303,
    Mtvec = 0x305,
    Mepc = 0x341,
    Mcause = 0x342,
    Mip = 0x344,
}

impl Csr {
    /// Architectural CSR address.
    pub fn addr(self) -> u16 {
        self as u16
    }

    /// Architectural register name, as it appears in trace output.
    pub fn name(self) -> &'static str {
        match self {
            Csr::Utvec => "utvec",
            Csr::Uepc => "uepc",
            Csr::Ucause => "ucause",
            Csr::Sedeleg => "sedeleg",
            Csr::Sideleg => "sideleg",
            Csr::Stvec => "stvec",
            Csr::Sepc => "sepc",
            Csr::Scause => "scause",
            Csr::Mstatus => "mstatus",
            Csr::Medeleg => "medeleg",
            Csr::Mideleg => "mideleg",
            Csr::Mtvec => "mtvec",
            Csr::Mepc => "mepc",
            Csr::Mcause => "mcause",
            Csr::Mip => "mip",
        }
    }
}

/// Register file for the trap-relevant CSRs of one hart.
///
/// Two access styles, mirrored on the [`Context`](crate::hart::Context)
/// capability:
/// - [`read`](Self::read) / [`write`](Self::write) are the
///   architecture-visible accessors; `write` applies WARL masking (epc
///   registers clear bit 0, mstatus keeps only its writable bits).
/// - [`read_raw`](Self::read_raw) / [`write_raw`](Self::write_raw) bypass
///   all masking and side effects. The reset path uses only these, so it
///   cannot re-trigger a trap.
#[derive(Debug, Clone, Default)]
pub struct CsrFile {
    pub mstatus: u64,
    pub medeleg: u64,
    pub mideleg: u64,
    pub mtvec: u64,
    pub mepc: u64,
    pub mcause: u64,
    pub mip: u64,

    pub sedeleg: u64,
    pub sideleg: u64,
    pub stvec: u64,
    pub sepc: u64,
    pub scause: u64,

    pub utvec: u64,
    pub uepc: u64,
    pub ucause: u64,
}

impl CsrFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Architecture-visible read.
    pub fn read(&self, csr: Csr) -> u64 {
        // No trap CSR in this set has read side effects; the entry point
        // exists so callers state which contract they rely on.
        self.read_raw(csr)
    }

    /// Read without architectural side effects.
    pub fn read_raw(&self, csr: Csr) -> u64 {
        match csr {
            Csr::Mstatus => self.mstatus,
            Csr::Medeleg => self.medeleg,
            Csr::Mideleg => self.mideleg,
            Csr::Mtvec => self.mtvec,
            Csr::Mepc => self.mepc,
            Csr::Mcause => self.mcause,
            Csr::Mip => self.mip,
            Csr::Sedeleg => self.sedeleg,
            Csr::Sideleg => self.sideleg,
            Csr::Stvec => self.stvec,
            Csr::Sepc => self.sepc,
            Csr::Scause => self.scause,
            Csr::Utvec => self.utvec,
            Csr::Uepc => self.uepc,
            Csr::Ucause => self.ucause,
        }
    }

    /// Architecture-visible write, with WARL masking.
    pub fn write(&mut self, csr: Csr, value: u64) {
        match csr {
            Csr::Mstatus => {
                self.mstatus = (self.mstatus & !mstatus::WRITABLE) | (value & mstatus::WRITABLE);
            }
            // epc registers cannot hold a misaligned address
            Csr::Mepc => self.mepc = value & !0b1,
            Csr::Sepc => self.sepc = value & !0b1,
            Csr::Uepc => self.uepc = value & !0b1,
            Csr::Mip => {
                // Only the software-pending bits are writable this way
                const MIP_WRITABLE: u64 = (1 << 1) | (1 << 3); // SSIP, MSIP
                self.mip = (self.mip & !MIP_WRITABLE) | (value & MIP_WRITABLE);
            }
            _ => self.write_raw(csr, value),
        }
    }

    /// Write without masking or side effects.
    pub fn write_raw(&mut self, csr: Csr, value: u64) {
        match csr {
            Csr::Mstatus => self.mstatus = value,
            Csr::Medeleg => self.medeleg = value,
            Csr::Mideleg => self.mideleg = value,
            Csr::Mtvec => self.mtvec = value,
            Csr::Mepc => self.mepc = value,
            Csr::Mcause => self.mcause = value,
            Csr::Mip => self.mip = value,
            Csr::Sedeleg => self.sedeleg = value,
            Csr::Sideleg => self.sideleg = value,
            Csr::Stvec => self.stvec = value,
            Csr::Sepc => self.sepc = value,
            Csr::Scause => self.scause = value,
            Csr::Utvec => self.utvec = value,
            Csr::Uepc => self.uepc = value,
            Csr::Ucause => self.ucause = value,
        }
    }

    /// MIE (global machine interrupt enable) bit of mstatus.
    pub fn mie(&self) -> bool {
        (self.mstatus & mstatus::MIE) != 0
    }

    pub fn set_mie(&mut self, value: bool) {
        if value {
            self.mstatus |= mstatus::MIE;
        } else {
            self.mstatus &= !mstatus::MIE;
        }
    }

    /// MPIE (previous interrupt enable) bit of mstatus.
    pub fn mpie(&self) -> bool {
        (self.mstatus & mstatus::MPIE) != 0
    }

    /// MPRV (modify privilege) bit of mstatus.
    pub fn mprv(&self) -> bool {
        (self.mstatus & mstatus::MPRV) != 0
    }
}
