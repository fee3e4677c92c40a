/// Primary opcode values (`instruction[31:26]`) that fan out to a second table.
pub const PRIMARY_SPECIAL: u8 = 0x00;
/// Primary opcode of the `BLTZ`/`BGEZ`/`BLTZAL`/`BGEZAL` group.
pub const PRIMARY_BCOND: u8 = 0x01;

/// Every operation the R3000A integer core executes.
///
/// Coprocessor forms carry the coprocessor number; their sub-forms are decoded
/// by the coprocessor dispatch, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Operation {
    Sll,
    Srl,
    Sra,
    Sllv,
    Srlv,
    Srav,
    Jr,
    Jalr,
    Syscall,
    Break,
    Mfhi,
    Mthi,
    Mflo,
    Mtlo,
    Mult,
    Multu,
    Div,
    Divu,
    Add,
    Addu,
    Sub,
    Subu,
    And,
    Or,
    Xor,
    Nor,
    Slt,
    Sltu,
    Bltz,
    Bgez,
    Bltzal,
    Bgezal,
    J,
    Jal,
    Beq,
    Bne,
    Blez,
    Bgtz,
    Addi,
    Addiu,
    Slti,
    Sltiu,
    Andi,
    Ori,
    Xori,
    Lui,
    Cop(u8),
    Lb,
    Lh,
    Lwl,
    Lw,
    Lbu,
    Lhu,
    Lwr,
    Sb,
    Sh,
    Swl,
    Sw,
    Swr,
    Lwc(u8),
    Swc(u8),
}

/// Assigned primary opcodes. `SPECIAL` and `BCOND` resolve through their own
/// tables; any primary opcode missing here is reserved.
pub const PRIMARY_OPCODE_TABLE: &[(u8, Operation)] = &[
    (0x02, Operation::J),
    (0x03, Operation::Jal),
    (0x04, Operation::Beq),
    (0x05, Operation::Bne),
    (0x06, Operation::Blez),
    (0x07, Operation::Bgtz),
    (0x08, Operation::Addi),
    (0x09, Operation::Addiu),
    (0x0A, Operation::Slti),
    (0x0B, Operation::Sltiu),
    (0x0C, Operation::Andi),
    (0x0D, Operation::Ori),
    (0x0E, Operation::Xori),
    (0x0F, Operation::Lui),
    (0x10, Operation::Cop(0)),
    (0x11, Operation::Cop(1)),
    (0x12, Operation::Cop(2)),
    (0x13, Operation::Cop(3)),
    (0x20, Operation::Lb),
    (0x21, Operation::Lh),
    (0x22, Operation::Lwl),
    (0x23, Operation::Lw),
    (0x24, Operation::Lbu),
    (0x25, Operation::Lhu),
    (0x26, Operation::Lwr),
    (0x28, Operation::Sb),
    (0x29, Operation::Sh),
    (0x2A, Operation::Swl),
    (0x2B, Operation::Sw),
    (0x2E, Operation::Swr),
    (0x30, Operation::Lwc(0)),
    (0x31, Operation::Lwc(1)),
    (0x32, Operation::Lwc(2)),
    (0x33, Operation::Lwc(3)),
    (0x38, Operation::Swc(0)),
    (0x39, Operation::Swc(1)),
    (0x3A, Operation::Swc(2)),
    (0x3B, Operation::Swc(3)),
];

/// Assigned `SPECIAL` function codes (`instruction[5:0]`).
pub const SPECIAL_FUNCT_TABLE: &[(u8, Operation)] = &[
    (0x00, Operation::Sll),
    (0x02, Operation::Srl),
    (0x03, Operation::Sra),
    (0x04, Operation::Sllv),
    (0x06, Operation::Srlv),
    (0x07, Operation::Srav),
    (0x08, Operation::Jr),
    (0x09, Operation::Jalr),
    (0x0C, Operation::Syscall),
    (0x0D, Operation::Break),
    (0x10, Operation::Mfhi),
    (0x11, Operation::Mthi),
    (0x12, Operation::Mflo),
    (0x13, Operation::Mtlo),
    (0x18, Operation::Mult),
    (0x19, Operation::Multu),
    (0x1A, Operation::Div),
    (0x1B, Operation::Divu),
    (0x20, Operation::Add),
    (0x21, Operation::Addu),
    (0x22, Operation::Sub),
    (0x23, Operation::Subu),
    (0x24, Operation::And),
    (0x25, Operation::Or),
    (0x26, Operation::Xor),
    (0x27, Operation::Nor),
    (0x2A, Operation::Slt),
    (0x2B, Operation::Sltu),
];

/// Resolves a primary opcode through [`PRIMARY_OPCODE_TABLE`].
#[must_use]
pub fn classify_primary(opcode: u8) -> Option<Operation> {
    PRIMARY_OPCODE_TABLE
        .iter()
        .find_map(|(entry, operation)| (*entry == opcode).then_some(*operation))
}

/// Resolves a `SPECIAL` function code through [`SPECIAL_FUNCT_TABLE`].
#[must_use]
pub fn classify_special(funct: u8) -> Option<Operation> {
    SPECIAL_FUNCT_TABLE
        .iter()
        .find_map(|(entry, operation)| (*entry == funct).then_some(*operation))
}

/// Resolves the `BCOND` group from the `rt` field.
///
/// Every `rt` value is accepted: bit 0 selects `>= 0` over `< 0`, and the
/// link forms are exactly `rt[4:1] == 0b1000`. Other combinations behave as
/// the plain compare.
#[must_use]
pub const fn classify_bcond(rt: u8) -> Operation {
    let greater_or_equal = rt & 0x01 != 0;
    let link = rt & 0x1E == 0x10;
    match (greater_or_equal, link) {
        (false, false) => Operation::Bltz,
        (true, false) => Operation::Bgez,
        (false, true) => Operation::Bltzal,
        (true, true) => Operation::Bgezal,
    }
}
