//! Dispatch behavior: status save, write ordering, simplified-mode
//! diagnostics, reset, and mode/variant gating.

use riscv_trap::csr::{Csr, INTERRUPT_BIT, causes, mstatus};
use riscv_trap::fault::TrapCause;
use riscv_trap::{Context, Fatal, Fault, Hart, Instr, SimConfig, SyscallHandler, Vectoring};

const NOP: Instr = Instr::new(0x0000_0013);

#[test]
fn interrupt_round_trip_without_delegation() {
    let cfg = SimConfig::full_system(0x8000_0000);
    let mut hart = Hart::new();
    hart.pc = 0x8000_1234;
    hart.csrs.mtvec = 0x8000_0100;

    let fault = Fault::Interrupt { code: causes::MTI };
    fault.invoke(&cfg, &mut hart, NOP).unwrap();

    assert_eq!(hart.csrs.mcause, INTERRUPT_BIT | 7);
    assert_eq!(hart.csrs.mepc, 0x8000_1234);
    assert_eq!(hart.pc, 0x8000_0100);
}

#[test]
fn status_save_is_idempotent_in_mie() {
    // MPIE must equal the MIE value observed right before dispatch, and MIE
    // must end up clear, whatever it was before.
    for prior in [false, true] {
        let cfg = SimConfig::full_system(0);
        let mut hart = Hart::new();
        hart.csrs.set_mie(prior);
        hart.csrs.mtvec = 0x100;

        Fault::Interrupt { code: causes::MEI }
            .invoke(&cfg, &mut hart, NOP)
            .unwrap();

        assert_eq!(hart.csrs.mpie(), prior);
        assert!(!hart.csrs.mie());
    }
}

#[test]
fn syscall_delegates_with_ecall_cause() {
    let cfg = SimConfig::full_system(0);
    let mut hart = Hart::new();
    hart.pc = 0x1000;
    hart.csrs.mtvec = 0x2000;

    Fault::SystemCall.invoke(&cfg, &mut hart, NOP).unwrap();

    // Exception: interrupt flag clear, ecall-from-U code.
    assert_eq!(hart.csrs.mcause, causes::ECALL_U);
    assert_eq!(hart.csrs.mepc, 0x1000);
    assert_eq!(hart.pc, 0x2000);
}

#[test]
fn delegated_syscall_writes_supervisor_pair_but_machine_vector() {
    let cfg = SimConfig::full_system(0);
    let mut hart = Hart::new();
    hart.pc = 0x1000;
    hart.csrs.mtvec = 0x2000;
    hart.csrs.stvec = 0x3000;
    hart.csrs.medeleg = 1 << causes::ECALL_U;

    Fault::SystemCall.invoke(&cfg, &mut hart, NOP).unwrap();

    assert_eq!(hart.csrs.scause, causes::ECALL_U);
    assert_eq!(hart.csrs.sepc, 0x1000);
    // Machine cause/epc untouched.
    assert_eq!(hart.csrs.mcause, 0);
    assert_eq!(hart.csrs.mepc, 0);
    // Default vectoring redirects to mtvec even for delegated traps.
    assert_eq!(hart.pc, 0x2000);
}

#[test]
fn per_level_vectoring_uses_destination_tvec() {
    let mut cfg = SimConfig::full_system(0);
    cfg.vectoring = Vectoring::PerLevel;

    let mut hart = Hart::new();
    hart.pc = 0x1000;
    hart.csrs.mtvec = 0x2000;
    hart.csrs.stvec = 0x3000;
    hart.csrs.mideleg = 1 << causes::STI;

    Fault::Interrupt { code: causes::STI }
        .invoke(&cfg, &mut hart, NOP)
        .unwrap();

    assert_eq!(hart.csrs.scause, INTERRUPT_BIT | causes::STI);
    assert_eq!(hart.csrs.sepc, 0x1000);
    assert_eq!(hart.pc, 0x3000);
}

// --- write-ordering instrumentation -------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Event {
    WriteCsr(Csr),
    SetPc(u64),
}

/// Context wrapper recording every mutation, for the ordering guarantee.
struct Recorder {
    hart: Hart,
    events: Vec<Event>,
}

impl Recorder {
    fn new(hart: Hart) -> Self {
        Self {
            hart,
            events: Vec::new(),
        }
    }
}

impl Context for Recorder {
    fn reg(&self, idx: u8) -> u64 {
        self.hart.reg(idx)
    }

    fn set_reg(&mut self, idx: u8, value: u64) {
        self.hart.set_reg(idx, value);
    }

    fn pc(&self) -> u64 {
        self.hart.pc()
    }

    fn set_pc(&mut self, pc: u64) {
        self.events.push(Event::SetPc(pc));
        self.hart.set_pc(pc);
    }

    fn read_csr(&mut self, csr: Csr) -> u64 {
        self.hart.read_csr(csr)
    }

    fn read_csr_raw(&self, csr: Csr) -> u64 {
        self.hart.read_csr_raw(csr)
    }

    fn write_csr(&mut self, csr: Csr, value: u64) {
        self.events.push(Event::WriteCsr(csr));
        self.hart.write_csr(csr, value);
    }

    fn write_csr_raw(&mut self, csr: Csr, value: u64) {
        self.events.push(Event::WriteCsr(csr));
        self.hart.write_csr_raw(csr, value);
    }

    fn syscall(&mut self, num: u64) -> Option<Fault> {
        self.hart.syscall(num)
    }

    fn sched_break(&mut self, delta: u64) {
        self.hart.sched_break(delta);
    }

    fn clear_arch_regs(&mut self) {
        self.hart.clear_arch_regs();
    }

    fn clear_interrupts(&mut self) {
        self.hart.clear_interrupts();
    }
}

#[test]
fn pc_redirect_happens_after_cause_epc_status() {
    let cfg = SimConfig::full_system(0);
    let mut hart = Hart::new();
    hart.pc = 0x1000;
    hart.csrs.mtvec = 0x2000;

    let mut ctx = Recorder::new(hart);
    Fault::Interrupt { code: causes::MTI }
        .invoke(&cfg, &mut ctx, NOP)
        .unwrap();

    assert_eq!(
        ctx.events,
        vec![
            Event::WriteCsr(Csr::Mcause),
            Event::WriteCsr(Csr::Mepc),
            Event::WriteCsr(Csr::Mstatus),
            Event::SetPc(0x2000),
        ]
    );
}

// --- simplified mode ----------------------------------------------------

#[test]
fn illegal_instruction_diagnostic_names_word_and_reason() {
    let cfg = SimConfig::process();
    let mut hart = Hart::new();
    hart.pc = 0x4000;
    hart.csrs.mtvec = 0x9999;

    let fault = Fault::IllegalInstruction {
        inst: 0xdeadbeef,
        reason: "bad opcode".into(),
    };
    let err = fault.invoke(&cfg, &mut hart, NOP).unwrap_err();

    let msg = err.to_string();
    assert!(msg.contains("deadbeef"), "missing word in: {msg}");
    assert!(msg.contains("bad opcode"), "missing reason in: {msg}");
    // The run aborts without any redirect; in particular, not to mtvec.
    assert_eq!(hart.pc, 0x4000);
}

#[test]
fn unimplemented_and_rounding_mode_diagnostics() {
    let cfg = SimConfig::process();
    let mut hart = Hart::new();
    hart.pc = 0x80;

    let err = Fault::UnimplementedInstruction {
        mnemonic: "fcvt.d.s".into(),
    }
    .invoke(&cfg, &mut hart, NOP)
    .unwrap_err();
    assert!(err.to_string().contains("fcvt.d.s"));

    let err = Fault::IllegalRoundingMode { frm: 0b101 }
        .invoke(&cfg, &mut hart, NOP)
        .unwrap_err();
    assert!(err.to_string().contains("rounding mode 0x5"));
    assert!(err.to_string().contains("0000000000000080"));
}

#[test]
fn breakpoint_requests_one_sched_break_and_continues() {
    let cfg = SimConfig::process();
    let mut hart = Hart::new();
    hart.pc = 0x4000;
    hart.regs[5] = 0xabcd;
    let regs_before = hart.regs;

    Fault::Breakpoint.invoke(&cfg, &mut hart, NOP).unwrap();

    assert_eq!(hart.take_sched_breaks(), 1);
    assert_eq!(hart.take_sched_breaks(), 0);
    assert_eq!(hart.regs, regs_before);
    assert_eq!(hart.pc, 0x4004);
}

#[test]
fn compressed_fault_advances_two_bytes() {
    let cfg = SimConfig::process();
    let mut hart = Hart::new();
    hart.pc = 0x4000;

    // c.nop: low bits != 0b11, so a two-byte retirement step.
    Fault::Breakpoint
        .invoke(&cfg, &mut hart, Instr::new(0x0001))
        .unwrap();

    assert_eq!(hart.pc, 0x4002);
}

#[test]
fn generic_fault_aborts_with_name_and_pc() {
    let cfg = SimConfig::process();
    let mut hart = Hart::new();
    hart.pc = 0x10;

    let err = Fault::Generic { name: "bogus" }
        .invoke(&cfg, &mut hart, NOP)
        .unwrap_err();

    assert_eq!(
        err,
        Fatal::Fault {
            name: "bogus",
            pc: 0x10
        }
    );
}

struct EchoSyscalls;

impl SyscallHandler for EchoSyscalls {
    fn syscall(&mut self, num: u64, regs: &mut [u64; 32]) -> Option<Fault> {
        regs[10] = num.wrapping_add(1); // echo into a0
        None
    }
}

#[test]
fn process_syscall_runs_host_handler_and_retires() {
    let cfg = SimConfig::process();
    let mut hart = Hart::with_syscalls(Box::new(EchoSyscalls));
    hart.pc = 0x100;
    hart.regs[17] = 93; // a7 = exit

    Fault::SystemCall.invoke(&cfg, &mut hart, NOP).unwrap();

    assert_eq!(hart.regs[10], 94);
    assert_eq!(hart.pc, 0x104);
    // No delegation happened.
    assert_eq!(hart.csrs.mcause, 0);
}

#[test]
fn process_syscall_without_handler_is_tolerated() {
    let cfg = SimConfig::process();
    let mut hart = Hart::new();
    hart.pc = 0x100;

    Fault::SystemCall.invoke(&cfg, &mut hart, NOP).unwrap();
    assert_eq!(hart.pc, 0x104);
}

// --- mode gating --------------------------------------------------------

#[test]
fn interrupt_in_process_mode_is_a_config_error() {
    let cfg = SimConfig::process();
    let mut hart = Hart::new();

    let err = Fault::Interrupt { code: causes::MTI }
        .invoke(&cfg, &mut hart, NOP)
        .unwrap_err();
    assert!(matches!(err, Fatal::RequiresFullSystem(_)));
}

#[test]
fn diagnostic_faults_have_no_full_system_handler() {
    let cfg = SimConfig::full_system(0);
    let mut hart = Hart::new();

    let err = Fault::IllegalInstruction {
        inst: 0,
        reason: "x".into(),
    }
    .invoke(&cfg, &mut hart, NOP)
    .unwrap_err();
    assert_eq!(err, Fatal::NoSystemHandler("illegal instruction"));
}

// --- reset --------------------------------------------------------------

#[test]
fn full_system_reset_clears_state_and_jumps_to_reset_vector() {
    let cfg = SimConfig::full_system(0x8000_0000);
    let mut hart = Hart::new();
    hart.pc = 0xdead;
    hart.regs[1] = 7;
    hart.regs[31] = 9;
    hart.csrs.mstatus = mstatus::MIE | mstatus::MPRV | mstatus::MPIE;
    hart.csrs.mip = 1 << 7;

    Fault::Reset.invoke(&cfg, &mut hart, NOP).unwrap();

    assert_eq!(hart.regs, [0; 32]);
    assert!(!hart.csrs.mie());
    assert!(!hart.csrs.mprv());
    // Untouched bits survive the read-modify-write.
    assert!(hart.csrs.mpie());
    assert_eq!(hart.csrs.mip, 0);
    assert_eq!(hart.pc, 0x8000_0000);
}

#[test]
fn process_reset_only_moves_the_pc() {
    let mut cfg = SimConfig::process();
    cfg.reset_vector = 0x2000;

    let mut hart = Hart::new();
    hart.pc = 0xdead;
    hart.regs[1] = 7;
    hart.csrs.mstatus = mstatus::MIE;

    Fault::Reset.invoke(&cfg, &mut hart, NOP).unwrap();

    assert_eq!(hart.pc, 0x2000);
    assert_eq!(hart.regs[1], 7);
    assert!(hart.csrs.mie());
}

#[test]
fn cause_values_are_tagged_with_the_interrupt_flag() {
    assert_eq!(TrapCause::Exception(causes::ECALL_U).value(), 8);
    assert_eq!(
        TrapCause::Interrupt(causes::MTI).value(),
        INTERRUPT_BIT | 7
    );
    assert_eq!(Fault::Breakpoint.cause(), TrapCause::Exception(3));
    assert_eq!(
        Fault::UnknownInstruction { inst: 0 }.cause(),
        TrapCause::Exception(causes::ILLEGAL_INSTRUCTION)
    );
}
