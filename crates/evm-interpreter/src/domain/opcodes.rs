//! # Opcodes
//!
//! Decoded instruction set up to Cancun. PUSH/DUP/SWAP/LOG carry their
//! operand count instead of one variant per width.

/// A decoded EVM instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    // 0x00 - Stop and Arithmetic
    Stop,
    Add,
    Mul,
    Sub,
    Div,
    SDiv,
    Mod,
    SMod,
    AddMod,
    MulMod,
    Exp,
    SignExtend,

    // 0x10 - Comparison & Bitwise
    Lt,
    Gt,
    SLt,
    SGt,
    Eq,
    IsZero,
    And,
    Or,
    Xor,
    Not,
    Byte,
    Shl,
    Shr,
    Sar,

    Keccak256,

    // 0x30 - Environment
    Address,
    Balance,
    Origin,
    Caller,
    CallValue,
    CallDataLoad,
    CallDataSize,
    CallDataCopy,
    CodeSize,
    CodeCopy,
    GasPrice,
    ExtCodeSize,
    ExtCodeCopy,
    ReturnDataSize,
    ReturnDataCopy,
    ExtCodeHash,

    // 0x40 - Block
    BlockHash,
    Coinbase,
    Timestamp,
    Number,
    PrevRandao,
    GasLimit,
    ChainId,
    SelfBalance,
    BaseFee,
    BlobHash,
    BlobBaseFee,

    // 0x50 - Stack, Memory, Storage, Flow
    Pop,
    MLoad,
    MStore,
    MStore8,
    SLoad,
    SStore,
    Jump,
    JumpI,
    Pc,
    MSize,
    Gas,
    JumpDest,
    TLoad,
    TStore,
    MCopy,

    /// PUSH0..PUSH32, with the number of immediate bytes
    Push(u8),
    /// DUP1..DUP16
    Dup(u8),
    /// SWAP1..SWAP16
    Swap(u8),
    /// LOG0..LOG4, with the topic count
    Log(u8),

    // 0xF0 - System
    Create,
    Call,
    CallCode,
    Return,
    DelegateCall,
    Create2,
    StaticCall,
    Revert,
    Invalid,
    SelfDestruct,
}

impl Opcode {
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        let op = match byte {
            0x00 => Self::Stop,
            0x01 => Self::Add,
            0x02 => Self::Mul,
            0x03 => Self::Sub,
            0x04 => Self::Div,
            0x05 => Self::SDiv,
            0x06 => Self::Mod,
            0x07 => Self::SMod,
            0x08 => Self::AddMod,
            0x09 => Self::MulMod,
            0x0A => Self::Exp,
            0x0B => Self::SignExtend,

            0x10 => Self::Lt,
            0x11 => Self::Gt,
            0x12 => Self::SLt,
            0x13 => Self::SGt,
            0x14 => Self::Eq,
            0x15 => Self::IsZero,
            0x16 => Self::And,
            0x17 => Self::Or,
            0x18 => Self::Xor,
            0x19 => Self::Not,
            0x1A => Self::Byte,
            0x1B => Self::Shl,
            0x1C => Self::Shr,
            0x1D => Self::Sar,

            0x20 => Self::Keccak256,

            0x30 => Self::Address,
            0x31 => Self::Balance,
            0x32 => Self::Origin,
            0x33 => Self::Caller,
            0x34 => Self::CallValue,
            0x35 => Self::CallDataLoad,
            0x36 => Self::CallDataSize,
            0x37 => Self::CallDataCopy,
            0x38 => Self::CodeSize,
            0x39 => Self::CodeCopy,
            0x3A => Self::GasPrice,
            0x3B => Self::ExtCodeSize,
            0x3C => Self::ExtCodeCopy,
            0x3D => Self::ReturnDataSize,
            0x3E => Self::ReturnDataCopy,
            0x3F => Self::ExtCodeHash,

            0x40 => Self::BlockHash,
            0x41 => Self::Coinbase,
            0x42 => Self::Timestamp,
            0x43 => Self::Number,
            0x44 => Self::PrevRandao,
            0x45 => Self::GasLimit,
            0x46 => Self::ChainId,
            0x47 => Self::SelfBalance,
            0x48 => Self::BaseFee,
            0x49 => Self::BlobHash,
            0x4A => Self::BlobBaseFee,

            0x50 => Self::Pop,
            0x51 => Self::MLoad,
            0x52 => Self::MStore,
            0x53 => Self::MStore8,
            0x54 => Self::SLoad,
            0x55 => Self::SStore,
            0x56 => Self::Jump,
            0x57 => Self::JumpI,
            0x58 => Self::Pc,
            0x59 => Self::MSize,
            0x5A => Self::Gas,
            0x5B => Self::JumpDest,
            0x5C => Self::TLoad,
            0x5D => Self::TStore,
            0x5E => Self::MCopy,

            0x5F..=0x7F => Self::Push(byte - 0x5F),
            0x80..=0x8F => Self::Dup(byte - 0x7F),
            0x90..=0x9F => Self::Swap(byte - 0x8F),
            0xA0..=0xA4 => Self::Log(byte - 0xA0),

            0xF0 => Self::Create,
            0xF1 => Self::Call,
            0xF2 => Self::CallCode,
            0xF3 => Self::Return,
            0xF4 => Self::DelegateCall,
            0xF5 => Self::Create2,
            0xFA => Self::StaticCall,
            0xFD => Self::Revert,
            0xFE => Self::Invalid,
            0xFF => Self::SelfDestruct,

            _ => return None,
        };
        Some(op)
    }

    /// Immediate bytes following a PUSH.
    #[must_use]
    pub fn push_size(&self) -> Option<usize> {
        match self {
            Self::Push(n) => Some(usize::from(*n)),
            _ => None,
        }
    }

    /// Writes that a static frame must reject.
    #[must_use]
    pub fn is_state_modifying(&self) -> bool {
        matches!(
            self,
            Self::SStore
                | Self::TStore
                | Self::Log(_)
                | Self::Create
                | Self::Create2
                | Self::SelfDestruct
        )
    }
}

/// Bitmap of valid JUMPDEST offsets, skipping PUSH immediates.
#[must_use]
pub fn analyze_jump_dests(code: &[u8]) -> Vec<bool> {
    let mut dests = vec![false; code.len()];
    let mut i = 0;
    while i < code.len() {
        let op = code[i];
        if op == 0x5B {
            dests[i] = true;
        } else if (0x60..=0x7F).contains(&op) {
            i += usize::from(op - 0x5F);
        }
        i += 1;
    }
    dests
}
