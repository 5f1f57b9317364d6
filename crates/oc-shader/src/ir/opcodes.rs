//! IR opcode table

use super::ty::Type;
use std::fmt;

macro_rules! opcodes {
    ($($name:ident: $ret:ident($($arg:ident),*);)*) => {
        /// IR instruction opcode
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Opcode {
            $($name,)*
        }

        impl Opcode {
            /// Every opcode, in declaration order
            pub const ALL: &'static [Opcode] = &[$(Opcode::$name,)*];

            pub fn result_type(self) -> Type {
                match self {
                    $(Opcode::$name => Type::$ret,)*
                }
            }

            /// Fixed argument types; empty for the variadic `Phi`
            pub fn arg_types(self) -> &'static [Type] {
                match self {
                    $(Opcode::$name => &[$(Type::$arg),*],)*
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(Opcode::$name => stringify!($name),)*
                }
            }
        }
    };
}

opcodes! {
    // Special
    Phi: Opaque();
    Void: Void();
    Reference: Void(Opaque);
    PhiMove: Void(Opaque, Opaque);
    Prologue: Void();
    Epilogue: Void();
    Join: Void();
    DemoteToHelperInvocation: Void();
    EmitVertex: Void(U32);
    EndPrimitive: Void(U32);

    // Barriers
    Barrier: Void();
    WorkgroupMemoryBarrier: Void();
    DeviceMemoryBarrier: Void();

    // Undefined
    UndefU1: U1();
    UndefU8: U8();
    UndefU16: U16();
    UndefU32: U32();
    UndefU64: U64();

    // Context getters/setters
    GetCbufU8: U32(U32, U32);
    GetCbufS8: U32(U32, U32);
    GetCbufU16: U32(U32, U32);
    GetCbufS16: U32(U32, U32);
    GetCbufU32: U32(U32, U32);
    GetCbufF32: F32(U32, U32);
    GetCbufU32x2: U32x2(U32, U32);
    GetAttribute: F32(Attribute, U32);
    GetAttributeU32: U32(Attribute, U32);
    SetAttribute: Void(Attribute, F32, U32);
    GetAttributeIndexed: F32(U32, U32);
    SetAttributeIndexed: Void(U32, F32, U32);
    SetFragColor: Void(U32, U32, F32);
    SetSampleMask: Void(U32);
    SetFragDepth: Void(F32);
    WorkgroupId: U32x3();
    LocalInvocationId: U32x3();
    InvocationId: U32();
    SampleId: U32();
    IsHelperInvocation: U1();
    YDirection: F32();
    ResolutionDownFactor: F32();
    RenderArea: F32x4();
    LoadLocal: U32(U32);
    WriteLocal: Void(U32, U32);

    // Global memory
    LoadGlobal32: U32(U64);
    LoadGlobal64: U32x2(U64);
    LoadGlobal128: U32x4(U64);
    WriteGlobal32: Void(U64, U32);
    WriteGlobal64: Void(U64, U32x2);
    WriteGlobal128: Void(U64, U32x4);

    // Storage buffers
    LoadStorage32: U32(U32, U32);
    LoadStorage64: U32x2(U32, U32);
    LoadStorage128: U32x4(U32, U32);
    WriteStorage32: Void(U32, U32, U32);
    WriteStorage64: Void(U32, U32, U32x2);
    WriteStorage128: Void(U32, U32, U32x4);

    // Shared memory
    LoadSharedU32: U32(U32);
    LoadSharedU64: U32x2(U32);
    WriteSharedU32: Void(U32, U32);
    WriteSharedU64: Void(U32, U32x2);

    // Vector utility
    CompositeConstructU32x2: U32x2(U32, U32);
    CompositeConstructU32x3: U32x3(U32, U32, U32);
    CompositeConstructU32x4: U32x4(U32, U32, U32, U32);
    CompositeExtractU32x2: U32(U32x2, U32);
    CompositeExtractU32x3: U32(U32x3, U32);
    CompositeExtractU32x4: U32(U32x4, U32);
    CompositeConstructF16x2: F16x2(F16, F16);
    CompositeConstructF32x2: F32x2(F32, F32);
    CompositeConstructF32x3: F32x3(F32, F32, F32);
    CompositeConstructF32x4: F32x4(F32, F32, F32, F32);
    CompositeExtractF32x2: F32(F32x2, U32);
    CompositeExtractF32x3: F32(F32x3, U32);
    CompositeExtractF32x4: F32(F32x4, U32);
    CompositeInsertF32x4: F32x4(F32x4, F32, U32);

    // Select
    SelectU1: U1(U1, U1, U1);
    SelectU8: U8(U1, U8, U8);
    SelectU16: U16(U1, U16, U16);
    SelectU32: U32(U1, U32, U32);
    SelectU64: U64(U1, U64, U64);
    SelectF16: F16(U1, F16, F16);
    SelectF32: F32(U1, F32, F32);
    SelectF64: F64(U1, F64, F64);

    // Bitwise conversions
    BitCastU16F16: U16(F16);
    BitCastU32F32: U32(F32);
    BitCastU64F64: U64(F64);
    BitCastF32U32: F32(U32);
    BitCastF64U64: F64(U64);
    PackUint2x32: U64(U32x2);
    UnpackUint2x32: U32x2(U64);
    PackHalf2x16: U32(F32x2);
    UnpackHalf2x16: F32x2(U32);
    PackFloat2x16: U32(F16x2);
    UnpackFloat2x16: F16x2(U32);

    // Floating-point operations
    FPAbs32: F32(F32);
    FPAbs64: F64(F64);
    FPAdd16: F16(F16, F16);
    FPAdd32: F32(F32, F32);
    FPAdd64: F64(F64, F64);
    FPFma32: F32(F32, F32, F32);
    FPFma64: F64(F64, F64, F64);
    FPMax32: F32(F32, F32);
    FPMin32: F32(F32, F32);
    FPMul32: F32(F32, F32);
    FPMul64: F64(F64, F64);
    FPNeg32: F32(F32);
    FPNeg64: F64(F64);
    FPRecip32: F32(F32);
    FPRecipSqrt32: F32(F32);
    FPSqrt: F32(F32);
    FPSin: F32(F32);
    FPCos: F32(F32);
    FPExp2: F32(F32);
    FPLog2: F32(F32);
    FPSaturate32: F32(F32);
    FPClamp32: F32(F32, F32, F32);
    FPRoundEven32: F32(F32);
    FPFloor32: F32(F32);
    FPCeil32: F32(F32);
    FPTrunc32: F32(F32);
    FPOrdEqual32: U1(F32, F32);
    FPUnordEqual32: U1(F32, F32);
    FPOrdNotEqual32: U1(F32, F32);
    FPUnordNotEqual32: U1(F32, F32);
    FPOrdLessThan32: U1(F32, F32);
    FPOrdGreaterThan32: U1(F32, F32);
    FPOrdLessThanEqual32: U1(F32, F32);
    FPOrdGreaterThanEqual32: U1(F32, F32);
    FPIsNan32: U1(F32);
    FSwizzleAdd: F32(F32, F32, U32);

    // Condition codes
    IAddCarry32: U32(U32, U32);
    GetCarry: U1();

    // Integer operations
    IAdd32: U32(U32, U32);
    IAdd64: U64(U64, U64);
    ISub32: U32(U32, U32);
    ISub64: U64(U64, U64);
    IMul32: U32(U32, U32);
    INeg32: U32(U32);
    INeg64: U64(U64);
    IAbs32: U32(U32);
    ShiftLeftLogical32: U32(U32, U32);
    ShiftLeftLogical64: U64(U64, U32);
    ShiftRightLogical32: U32(U32, U32);
    ShiftRightLogical64: U64(U64, U32);
    ShiftRightArithmetic32: U32(U32, U32);
    ShiftRightArithmetic64: U64(U64, U32);
    BitwiseAnd32: U32(U32, U32);
    BitwiseOr32: U32(U32, U32);
    BitwiseXor32: U32(U32, U32);
    BitwiseNot32: U32(U32);
    BitFieldInsert: U32(U32, U32, U32, U32);
    BitFieldSExtract: U32(U32, U32, U32);
    BitFieldUExtract: U32(U32, U32, U32);
    BitReverse32: U32(U32);
    BitCount32: U32(U32);
    FindSMsb32: U32(U32);
    FindUMsb32: U32(U32);
    SMin32: U32(U32, U32);
    UMin32: U32(U32, U32);
    SMax32: U32(U32, U32);
    UMax32: U32(U32, U32);
    SClamp32: U32(U32, U32, U32);
    UClamp32: U32(U32, U32, U32);
    SLessThan: U1(U32, U32);
    ULessThan: U1(U32, U32);
    IEqual: U1(U32, U32);
    SLessThanEqual: U1(U32, U32);
    ULessThanEqual: U1(U32, U32);
    SGreaterThan: U1(U32, U32);
    UGreaterThan: U1(U32, U32);
    INotEqual: U1(U32, U32);
    SGreaterThanEqual: U1(U32, U32);
    UGreaterThanEqual: U1(U32, U32);

    // Logical operations
    LogicalOr: U1(U1, U1);
    LogicalAnd: U1(U1, U1);
    LogicalXor: U1(U1, U1);
    LogicalNot: U1(U1);

    // Conversion operations
    ConvertS32F32: U32(F32);
    ConvertU32F32: U32(F32);
    ConvertF32S32: F32(U32);
    ConvertF32U32: F32(U32);
    ConvertF64F32: F64(F32);
    ConvertF32F64: F32(F64);
    ConvertU64U32: U64(U32);
    ConvertU32U64: U32(U64);
    ConvertF16F32: F16(F32);
    ConvertF32F16: F32(F16);

    // Atomic operations
    SharedAtomicIAdd32: U32(U32, U32);
    SharedAtomicSMin32: U32(U32, U32);
    SharedAtomicUMin32: U32(U32, U32);
    SharedAtomicSMax32: U32(U32, U32);
    SharedAtomicUMax32: U32(U32, U32);
    SharedAtomicInc32: U32(U32, U32);
    SharedAtomicDec32: U32(U32, U32);
    SharedAtomicAnd32: U32(U32, U32);
    SharedAtomicOr32: U32(U32, U32);
    SharedAtomicXor32: U32(U32, U32);
    SharedAtomicExchange32: U32(U32, U32);
    StorageAtomicIAdd32: U32(U32, U32, U32);
    StorageAtomicSMin32: U32(U32, U32, U32);
    StorageAtomicUMin32: U32(U32, U32, U32);
    StorageAtomicSMax32: U32(U32, U32, U32);
    StorageAtomicUMax32: U32(U32, U32, U32);
    StorageAtomicInc32: U32(U32, U32, U32);
    StorageAtomicDec32: U32(U32, U32, U32);
    StorageAtomicAnd32: U32(U32, U32, U32);
    StorageAtomicOr32: U32(U32, U32, U32);
    StorageAtomicXor32: U32(U32, U32, U32);
    StorageAtomicExchange32: U32(U32, U32, U32);
    StorageAtomicAddF32: F32(U32, U32, F32);
    StorageAtomicAddF16x2: U32(U32, U32, F16x2);
    StorageAtomicAddF32x2: U32(U32, U32, F32x2);
    StorageAtomicMinF16x2: U32(U32, U32, F16x2);
    StorageAtomicMinF32x2: U32(U32, U32, F32x2);
    StorageAtomicMaxF16x2: U32(U32, U32, F16x2);
    StorageAtomicMaxF32x2: U32(U32, U32, F32x2);
    GlobalAtomicIAdd32: U32(U64, U32);

    // Warp operations
    ShuffleIndex: U32(U32, U32, U32, U32);
    ShuffleUp: U32(U32, U32, U32, U32);
    ShuffleDown: U32(U32, U32, U32, U32);
    ShuffleButterfly: U32(U32, U32, U32, U32);
    ShuffleInBounds: U1();

    // Image operations
    ImageSampleImplicitLod: F32x4(U32, Opaque, F32);
    ImageSampleExplicitLod: F32x4(U32, Opaque, F32);
    ImageSampleDrefImplicitLod: F32(U32, Opaque, F32);
    ImageSampleDrefExplicitLod: F32(U32, Opaque, F32, F32);
    ImageGather: F32x4(U32, Opaque, U32);
    ImageFetch: F32x4(U32, Opaque, U32);
    ImageQueryDimensions: U32x4(U32, U32);
    ImageRead: U32x4(U32, Opaque);
    ImageWrite: Void(U32, Opaque, U32x4);
    TextureBufferFetch: F32x4(U32, U32);
    ImageBufferRead: U32x4(U32, U32);
    ImageBufferWrite: Void(U32, U32, U32x4);
}

impl Opcode {
    pub fn is_phi(self) -> bool {
        self == Opcode::Phi
    }

    /// Whether the instruction has effects beyond its result
    pub fn may_have_side_effects(self) -> bool {
        self.result_type() == Type::Void
            || self.name().contains("Atomic")
            || matches!(self, Opcode::Phi | Opcode::IAddCarry32)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
