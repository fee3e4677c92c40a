//! Exception entry and return: EPC/BD bookkeeping, `Cause` and `BadVAddr`,
//! vectors and the interrupt line.

#![allow(clippy::pedantic, clippy::nursery, clippy::unreadable_literal)]

use log as _;
use proptest as _;
use psx_core::peripherals::interrupt::{Irq, I_MASK};
use psx_core::{CoreConfig, Exception, Psx, TickOutcome};
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use thiserror as _;

const BIOS: u32 = 0xBFC0_0000;
const RAM_VECTOR: u32 = 0x8000_0080;
const BIOS_VECTOR: u32 = 0xBFC0_0180;

const T0: u32 = 8;
const T1: u32 = 9;
const T2: u32 = 10;
const K0: u32 = 26;

const fn special(rs: u32, rt: u32, rd: u32, funct: u32) -> u32 {
    (rs << 21) | (rt << 16) | (rd << 11) | funct
}

const fn imm(op: u32, rs: u32, rt: u32, value: u16) -> u32 {
    (op << 26) | (rs << 21) | (rt << 16) | value as u32
}

const fn lui(rt: u32, value: u16) -> u32 {
    imm(0x0F, 0, rt, value)
}

const fn ori(rt: u32, rs: u32, value: u16) -> u32 {
    imm(0x0D, rs, rt, value)
}

const fn addiu(rt: u32, rs: u32, value: u16) -> u32 {
    imm(0x09, rs, rt, value)
}

const fn mtc0(rt: u32, rd: u32) -> u32 {
    (0x10 << 26) | (0x04 << 21) | (rt << 16) | (rd << 11)
}

const fn mfc0(rt: u32, rd: u32) -> u32 {
    (0x10 << 26) | (rt << 16) | (rd << 11)
}

const SYSCALL: u32 = 0x0000_000C;
const RFE: u32 = 0x4200_0010;

fn boot(program: &[u32]) -> Psx {
    let mut bios = vec![0u8; 512 * 1024];
    for (index, word) in program.iter().enumerate() {
        bios[index * 4..index * 4 + 4].copy_from_slice(&word.to_le_bytes());
    }
    Psx::new(&bios, CoreConfig::default()).unwrap()
}

/// Runs the reset slot plus `executed` program instructions.
fn advance(psx: &mut Psx, executed: u64) {
    psx.run(executed + 1);
}

fn exc_code(psx: &Psx) -> u32 {
    (psx.cpu().cop0().cause() >> 2) & 0x1F
}

fn fault(outcome: TickOutcome) -> (Exception, u32, u32) {
    match outcome {
        TickOutcome::Exception { exception, epc, vector } => (exception, epc, vector),
        TickOutcome::Retired => panic!("expected an exception"),
    }
}

#[test]
fn syscall_latches_epc_and_jumps_to_ram_vector() {
    let mut psx = boot(&[0, SYSCALL]);
    advance(&mut psx, 1);
    let (exception, epc, vector) = fault(psx.tick());
    assert_eq!(exception, Exception::Syscall);
    assert_eq!(epc, BIOS + 4);
    assert_eq!(vector, RAM_VECTOR);
    assert_eq!(psx.cpu().cop0().epc(), BIOS + 4);
    assert_eq!(exc_code(&psx), 8);
    assert_eq!(psx.cpu().cop0().cause() & (1 << 31), 0);
    assert_eq!(psx.cpu().next_pc(), RAM_VECTOR);
}

#[test]
fn boot_exception_vector_selected_by_bev() {
    let mut psx = boot(&[lui(T0, 0x0040), mtc0(T0, 12), SYSCALL]);
    advance(&mut psx, 2);
    let (_, _, vector) = fault(psx.tick());
    assert_eq!(vector, BIOS_VECTOR);
}

#[test]
fn exception_in_delay_slot_points_epc_at_branch() {
    let mut psx = boot(&[imm(0x04, 0, 0, 4), SYSCALL]);
    advance(&mut psx, 1);
    let (exception, epc, _) = fault(psx.tick());
    assert_eq!(exception, Exception::Syscall);
    assert_eq!(epc, BIOS);
    assert_ne!(psx.cpu().cop0().cause() & (1 << 31), 0);
}

#[test]
fn instruction_after_fault_is_discarded() {
    let mut psx = boot(&[SYSCALL, addiu(T1, 0, 1)]);
    psx.run(8);
    assert_eq!(psx.cpu().registers().get(T1 as usize), 0);
}

#[test]
fn handler_returns_with_rfe_and_restores_mode() {
    let mut psx = boot(&[
        addiu(T0, 0, 0x0002),
        mtc0(T0, 12),
        SYSCALL,
        addiu(T1, 0, 9),
    ]);
    let handler = [
        mfc0(K0, 14),
        0,
        addiu(K0, K0, 4),
        special(K0, 0, 0, 0x08), // jr $k0
        RFE,
    ];
    for (index, word) in handler.iter().enumerate() {
        psx.bus_mut()
            .write_word(RAM_VECTOR + 4 * index as u32, *word)
            .unwrap();
    }

    advance(&mut psx, 2);
    psx.tick();
    assert_eq!(psx.cpu().cop0().status() & 0x3F, 0x08);
    assert!(psx.cpu().cop0().kernel_mode());

    psx.run(7);
    assert_eq!(psx.cpu().cop0().status() & 0x3F, 0x02);
    assert_eq!(psx.cpu().cop0().epc(), BIOS + 8);
    assert_eq!(psx.cpu().registers().get(T1 as usize), 9);
}

#[test]
fn add_overflow_traps_and_leaves_destination() {
    let mut psx = boot(&[
        lui(T0, 0x7FFF),
        ori(T0, T0, 0xFFFF),
        imm(0x08, T0, T1, 1), // addi $t1, $t0, 1
    ]);
    advance(&mut psx, 2);
    let (exception, epc, _) = fault(psx.tick());
    assert_eq!(exception, Exception::Overflow);
    assert_eq!(epc, BIOS + 8);
    psx.run(3);
    assert_eq!(psx.cpu().registers().get(T1 as usize), 0);
}

#[rstest]
#[case::addi_positive_limit(imm(0x08, T0, T1, 0x7FFF))]
#[case::add(special(T0, T0, T1, 0x20))]
#[case::sub_minus_one(special(T0, T2, T1, 0x22))]
fn signed_overflow_traps_precisely(#[case] word: u32) {
    let mut psx = boot(&[
        lui(T0, 0x7FFF),
        ori(T0, T0, 0xFFFF),
        addiu(T2, 0, 0xFFFF),
        addiu(T1, 0, 0x55),
        word,
    ]);
    advance(&mut psx, 4);
    let (exception, epc, vector) = fault(psx.tick());
    assert_eq!(exception, Exception::Overflow);
    assert_eq!(exc_code(&psx), 12);
    assert_eq!(epc, BIOS + 16);
    assert_eq!(vector, RAM_VECTOR);
    assert_eq!(psx.cpu().registers().get(T1 as usize), 0x55);
}

#[rstest]
#[case::primary_opcode(0xFC00_0000)]
#[case::special_funct(0x0000_0001)]
#[case::unused_shift_slot(0x0000_0005)]
fn undefined_encodings_raise_reserved_instruction(#[case] word: u32) {
    let mut psx = boot(&[word]);
    advance(&mut psx, 0);
    let (exception, _, _) = fault(psx.tick());
    assert_eq!(exception, Exception::ReservedInstruction);
    assert_eq!(exc_code(&psx), 0x0A);
}

#[test]
fn break_raises_breakpoint() {
    let mut psx = boot(&[0x0000_000D]);
    advance(&mut psx, 0);
    assert_eq!(psx.tick().exception(), Some(Exception::Breakpoint));
}

#[rstest]
#[case::cop1(0x4400_0000, 1)]
#[case::cop2_disabled(0x4800_0000, 2)]
#[case::cop3(0x4C00_0000, 3)]
#[case::lwc2_disabled(0xC800_0000, 2)]
fn disabled_coprocessors_report_their_number(#[case] word: u32, #[case] cop: u32) {
    let mut psx = boot(&[word]);
    advance(&mut psx, 0);
    assert_eq!(psx.tick().exception(), Some(Exception::CoprocessorUnusable));
    assert_eq!((psx.cpu().cop0().cause() >> 28) & 3, cop);
}

#[test]
fn cop0_is_unusable_in_user_mode() {
    let mut psx = boot(&[addiu(T0, 0, 0x0002), mtc0(T0, 12), mfc0(T1, 12)]);
    advance(&mut psx, 2);
    assert_eq!(psx.tick().exception(), Some(Exception::CoprocessorUnusable));
    assert_eq!((psx.cpu().cop0().cause() >> 28) & 3, 0);
}

#[test]
fn misaligned_jump_faults_at_target_fetch() {
    let mut psx = boot(&[
        lui(T0, 0x8000),
        ori(T0, T0, 0x0102),
        special(T0, 0, 0, 0x08),
        0,
    ]);
    advance(&mut psx, 4);
    let (exception, epc, _) = fault(psx.tick());
    assert_eq!(exception, Exception::AddressErrorLoad);
    assert_eq!(epc, 0x8000_0102);
    assert_eq!(psx.cpu().cop0().bad_vaddr(), 0x8000_0102);
}

#[rstest]
#[case::word_load(0x23, 0x0101, Exception::AddressErrorLoad)]
#[case::halfword_load(0x21, 0x0103, Exception::AddressErrorLoad)]
#[case::word_store(0x2B, 0x0102, Exception::AddressErrorStore)]
#[case::halfword_store(0x29, 0x0101, Exception::AddressErrorStore)]
fn misaligned_data_access_records_bad_vaddr(
    #[case] op: u32,
    #[case] offset: u16,
    #[case] expected: Exception,
) {
    let mut psx = boot(&[lui(T0, 0x8000), imm(op, T0, T1, offset)]);
    advance(&mut psx, 1);
    let (exception, epc, _) = fault(psx.tick());
    assert_eq!(exception, expected);
    assert_eq!(epc, BIOS + 4);
    assert_eq!(psx.cpu().cop0().bad_vaddr(), 0x8000_0000 | u32::from(offset));
}

#[test]
fn unmapped_data_access_is_a_data_bus_error() {
    let mut psx = boot(&[lui(T0, 0xC000), imm(0x23, T0, T1, 0)]);
    advance(&mut psx, 1);
    assert_eq!(psx.tick().exception(), Some(Exception::BusErrorData));
    assert_eq!(exc_code(&psx), 7);
}

#[test]
fn unmapped_fetch_is_an_instruction_bus_error() {
    let mut psx = boot(&[lui(T0, 0xBF90), special(T0, 0, 0, 0x08), 0]);
    advance(&mut psx, 3);
    let (exception, epc, _) = fault(psx.tick());
    assert_eq!(exception, Exception::BusErrorInstruction);
    assert_eq!(epc, 0xBF90_0000);
}

#[test]
fn unmasked_irq_interrupts_when_enabled() {
    let mut psx = boot(&[lui(T0, 0), ori(T0, T0, 0x0401), mtc0(T0, 12), 0, 0, 0]);
    psx.bus_mut().write_word(I_MASK, u32::from(Irq::Vblank.bit())).unwrap();
    advance(&mut psx, 4);
    psx.bus_mut().io_mut().interrupts.request(Irq::Vblank);

    let (exception, epc, vector) = fault(psx.tick());
    assert_eq!(exception, Exception::Interrupt);
    assert_eq!(epc, BIOS + 16);
    assert_eq!(vector, RAM_VECTOR);
    assert_eq!(exc_code(&psx), 0);
    assert_ne!(psx.cpu().cop0().cause() & (1 << 10), 0);
    assert_eq!(psx.cpu().cop0().status() & 0x3F, 0x04);
}

#[test]
fn interrupt_stays_pending_while_disabled() {
    let mut psx = boot(&[0, 0, 0]);
    psx.bus_mut().write_word(I_MASK, u32::from(Irq::Cdrom.bit())).unwrap();
    psx.bus_mut().io_mut().interrupts.request(Irq::Cdrom);
    let outcome = psx.run(4);
    assert_eq!(outcome.exceptions, 0);
    assert_ne!(psx.cpu().cop0().cause() & (1 << 10), 0);
}

#[test]
fn masked_irq_never_reaches_the_cpu() {
    let mut psx = boot(&[lui(T0, 0), ori(T0, T0, 0x0401), mtc0(T0, 12), 0, 0]);
    advance(&mut psx, 3);
    psx.bus_mut().io_mut().interrupts.request(Irq::Timer2);
    assert_eq!(psx.tick(), TickOutcome::Retired);
    assert_eq!(psx.cpu().cop0().cause() & (1 << 10), 0);
}
