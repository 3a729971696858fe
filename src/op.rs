//! SPIR-V opcode subset and operand schemas.
//!
//! The engine only needs structural knowledge of the instructions it rewrites
//! (types, variables, loads, decorations, sample operations, function
//! plumbing). Everything else round-trips untouched as [`Op::Unknown`].

/// SPIR-V magic number (word 0 of the header, in the module's native
/// endianness; this crate only accepts little-endian modules).
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Number of 32-bit words in the module header.
pub const HEADER_WORDS: usize = 5;

/// First SPIR-V version whose `OpEntryPoint` interface lists must name every
/// referenced global variable, not just Input/Output ones.
pub const VERSION_1_4: u32 = 0x0001_0400;

/// `Decoration::Binding`.
pub const DECORATION_BINDING: u32 = 33;
/// `Decoration::DescriptorSet`.
pub const DECORATION_DESCRIPTOR_SET: u32 = 34;

/// `StorageClass::UniformConstant`, where texture/sampler bindings live.
pub const STORAGE_CLASS_UNIFORM_CONSTANT: u32 = 0;

/// `OpTypeImage` "Depth" operand value for depth-capable images.
pub const IMAGE_DEPTH: u32 = 1;

/// The opcodes this engine understands structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Nop,
    Name,
    MemberName,
    EntryPoint,
    TypeVoid,
    TypeInt,
    TypeFloat,
    TypeImage,
    TypeSampler,
    TypeSampledImage,
    TypeArray,
    TypeRuntimeArray,
    TypePointer,
    TypeFunction,
    Constant,
    Function,
    FunctionParameter,
    FunctionEnd,
    FunctionCall,
    Variable,
    Load,
    Store,
    AccessChain,
    Decorate,
    SampledImage,
    ImageSampleImplicitLod,
    ImageSampleExplicitLod,
    ImageSampleDrefImplicitLod,
    ImageSampleDrefExplicitLod,
    ImageSampleProjImplicitLod,
    ImageSampleProjExplicitLod,
    ImageSampleProjDrefImplicitLod,
    ImageSampleProjDrefExplicitLod,
    ImageGather,
    ImageDrefGather,
    ImageSparseSampleImplicitLod,
    ImageSparseSampleExplicitLod,
    ImageSparseSampleDrefImplicitLod,
    ImageSparseSampleDrefExplicitLod,
    ImageSparseGather,
    ImageSparseDrefGather,
    /// Any opcode the engine does not rewrite; carried through verbatim.
    Unknown(u16),
}

/// Structural shape of a known opcode's operand list.
///
/// Operand counts exclude the leading word-count/opcode word but include the
/// result-type and result ids where present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpSchema {
    pub has_result_type: bool,
    pub has_result: bool,
    pub min_operands: usize,
    pub max_operands: Option<usize>,
}

const fn schema(
    has_result_type: bool,
    has_result: bool,
    min_operands: usize,
    max_operands: Option<usize>,
) -> OpSchema {
    OpSchema {
        has_result_type,
        has_result,
        min_operands,
        max_operands,
    }
}

impl Op {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => Self::Nop,
            5 => Self::Name,
            6 => Self::MemberName,
            15 => Self::EntryPoint,
            19 => Self::TypeVoid,
            21 => Self::TypeInt,
            22 => Self::TypeFloat,
            25 => Self::TypeImage,
            26 => Self::TypeSampler,
            27 => Self::TypeSampledImage,
            28 => Self::TypeArray,
            29 => Self::TypeRuntimeArray,
            32 => Self::TypePointer,
            33 => Self::TypeFunction,
            43 => Self::Constant,
            54 => Self::Function,
            55 => Self::FunctionParameter,
            56 => Self::FunctionEnd,
            57 => Self::FunctionCall,
            59 => Self::Variable,
            61 => Self::Load,
            62 => Self::Store,
            65 => Self::AccessChain,
            71 => Self::Decorate,
            86 => Self::SampledImage,
            87 => Self::ImageSampleImplicitLod,
            88 => Self::ImageSampleExplicitLod,
            89 => Self::ImageSampleDrefImplicitLod,
            90 => Self::ImageSampleDrefExplicitLod,
            91 => Self::ImageSampleProjImplicitLod,
            92 => Self::ImageSampleProjExplicitLod,
            93 => Self::ImageSampleProjDrefImplicitLod,
            94 => Self::ImageSampleProjDrefExplicitLod,
            96 => Self::ImageGather,
            97 => Self::ImageDrefGather,
            305 => Self::ImageSparseSampleImplicitLod,
            306 => Self::ImageSparseSampleExplicitLod,
            307 => Self::ImageSparseSampleDrefImplicitLod,
            308 => Self::ImageSparseSampleDrefExplicitLod,
            314 => Self::ImageSparseGather,
            315 => Self::ImageSparseDrefGather,
            other => Self::Unknown(other),
        }
    }

    /// Returns the raw 16-bit opcode value.
    pub fn raw(self) -> u16 {
        match self {
            Self::Nop => 0,
            Self::Name => 5,
            Self::MemberName => 6,
            Self::EntryPoint => 15,
            Self::TypeVoid => 19,
            Self::TypeInt => 21,
            Self::TypeFloat => 22,
            Self::TypeImage => 25,
            Self::TypeSampler => 26,
            Self::TypeSampledImage => 27,
            Self::TypeArray => 28,
            Self::TypeRuntimeArray => 29,
            Self::TypePointer => 32,
            Self::TypeFunction => 33,
            Self::Constant => 43,
            Self::Function => 54,
            Self::FunctionParameter => 55,
            Self::FunctionEnd => 56,
            Self::FunctionCall => 57,
            Self::Variable => 59,
            Self::Load => 61,
            Self::Store => 62,
            Self::AccessChain => 65,
            Self::Decorate => 71,
            Self::SampledImage => 86,
            Self::ImageSampleImplicitLod => 87,
            Self::ImageSampleExplicitLod => 88,
            Self::ImageSampleDrefImplicitLod => 89,
            Self::ImageSampleDrefExplicitLod => 90,
            Self::ImageSampleProjImplicitLod => 91,
            Self::ImageSampleProjExplicitLod => 92,
            Self::ImageSampleProjDrefImplicitLod => 93,
            Self::ImageSampleProjDrefExplicitLod => 94,
            Self::ImageGather => 96,
            Self::ImageDrefGather => 97,
            Self::ImageSparseSampleImplicitLod => 305,
            Self::ImageSparseSampleExplicitLod => 306,
            Self::ImageSparseSampleDrefImplicitLod => 307,
            Self::ImageSparseSampleDrefExplicitLod => 308,
            Self::ImageSparseGather => 314,
            Self::ImageSparseDrefGather => 315,
            Self::Unknown(raw) => raw,
        }
    }

    /// Operand schema for known opcodes; `None` for [`Op::Unknown`], whose
    /// operands are opaque.
    pub fn schema(self) -> Option<OpSchema> {
        Some(match self {
            Self::Nop => schema(false, false, 0, Some(0)),
            // target, name literal...
            Self::Name => schema(false, false, 2, None),
            // type, member, name literal...
            Self::MemberName => schema(false, false, 3, None),
            // execution model, entry point, name literal..., interface ids...
            Self::EntryPoint => schema(false, false, 3, None),
            Self::TypeVoid => schema(false, true, 1, Some(1)),
            // result, width, signedness
            Self::TypeInt => schema(false, true, 3, Some(3)),
            // result, width (+ optional FP encoding)
            Self::TypeFloat => schema(false, true, 2, Some(3)),
            // result, sampled type, dim, depth, arrayed, ms, sampled, format
            // (+ optional access qualifier)
            Self::TypeImage => schema(false, true, 8, Some(9)),
            Self::TypeSampler => schema(false, true, 1, Some(1)),
            // result, image type
            Self::TypeSampledImage => schema(false, true, 2, Some(2)),
            // result, element type, length
            Self::TypeArray => schema(false, true, 3, Some(3)),
            // result, element type
            Self::TypeRuntimeArray => schema(false, true, 2, Some(2)),
            // result, storage class, pointee
            Self::TypePointer => schema(false, true, 3, Some(3)),
            // result, return type, parameter types...
            Self::TypeFunction => schema(false, true, 2, None),
            // result type, result, value words...
            Self::Constant => schema(true, true, 3, None),
            // result type, result, function control, function type
            Self::Function => schema(true, true, 4, Some(4)),
            Self::FunctionParameter => schema(true, true, 2, Some(2)),
            Self::FunctionEnd => schema(false, false, 0, Some(0)),
            // result type, result, function, arguments...
            Self::FunctionCall => schema(true, true, 3, None),
            // result type, result, storage class (+ optional initializer)
            Self::Variable => schema(true, true, 3, Some(4)),
            // result type, result, pointer (+ memory operands...)
            Self::Load => schema(true, true, 3, None),
            // pointer, object (+ memory operands...)
            Self::Store => schema(false, false, 2, None),
            // result type, result, base, indexes...
            Self::AccessChain => schema(true, true, 3, None),
            // target, decoration, literals...
            Self::Decorate => schema(false, false, 2, None),
            // result type, result, image, sampler
            Self::SampledImage => schema(true, true, 4, Some(4)),
            // result type, result, sampled image, coordinate (+ dref /
            // component / image operands depending on the variant)
            Self::ImageSampleImplicitLod | Self::ImageSparseSampleImplicitLod => {
                schema(true, true, 4, None)
            }
            // Explicit-LOD forms require an image-operands mask.
            Self::ImageSampleExplicitLod | Self::ImageSparseSampleExplicitLod => {
                schema(true, true, 5, None)
            }
            Self::ImageSampleProjImplicitLod => schema(true, true, 4, None),
            Self::ImageSampleProjExplicitLod => schema(true, true, 5, None),
            Self::ImageSampleDrefImplicitLod
            | Self::ImageSampleProjDrefImplicitLod
            | Self::ImageSparseSampleDrefImplicitLod => schema(true, true, 5, None),
            Self::ImageSampleDrefExplicitLod
            | Self::ImageSampleProjDrefExplicitLod
            | Self::ImageSparseSampleDrefExplicitLod => schema(true, true, 6, None),
            Self::ImageGather | Self::ImageSparseGather => schema(true, true, 5, None),
            Self::ImageDrefGather | Self::ImageSparseDrefGather => schema(true, true, 5, None),
            Self::Unknown(_) => return None,
        })
    }

    /// True for type-declaring opcodes that participate in the structural
    /// type dedup table.
    pub fn is_type(self) -> bool {
        matches!(
            self,
            Self::TypeVoid
                | Self::TypeInt
                | Self::TypeFloat
                | Self::TypeImage
                | Self::TypeSampler
                | Self::TypeSampledImage
                | Self::TypeArray
                | Self::TypeRuntimeArray
                | Self::TypePointer
                | Self::TypeFunction
        )
    }

    /// Sample operations that compare against a depth reference value.
    pub fn is_dref_sample(self) -> bool {
        matches!(
            self,
            Self::ImageSampleDrefImplicitLod
                | Self::ImageSampleDrefExplicitLod
                | Self::ImageSampleProjDrefImplicitLod
                | Self::ImageSampleProjDrefExplicitLod
                | Self::ImageDrefGather
                | Self::ImageSparseSampleDrefImplicitLod
                | Self::ImageSparseSampleDrefExplicitLod
                | Self::ImageSparseDrefGather
        )
    }

    /// Ordinary (non-dref) sample operations over a sampled-image value.
    pub fn is_plain_sample(self) -> bool {
        matches!(
            self,
            Self::ImageSampleImplicitLod
                | Self::ImageSampleExplicitLod
                | Self::ImageSampleProjImplicitLod
                | Self::ImageSampleProjExplicitLod
                | Self::ImageGather
                | Self::ImageSparseSampleImplicitLod
                | Self::ImageSparseSampleExplicitLod
                | Self::ImageSparseGather
        )
    }
}

/// True for the debug, annotation, and mode-setting opcodes whose operand
/// words are enums, literals, or string fragments rather than value
/// references. A word in one of these matching a rewritten id does not
/// consume it.
pub fn is_metadata_opcode(raw: u16) -> bool {
    // OpUndef..OpExtInst, OpMemoryModel, OpExecutionMode, OpCapability,
    // OpModuleProcessed, OpExecutionModeId.
    matches!(raw, 1..=12 | 14 | 16 | 17 | 330 | 331)
}

/// Length, in words, of the nul-terminated literal string starting at
/// `operands[0]`, or `None` if no terminator is present.
///
/// SPIR-V literal strings are UTF-8, nul-terminated, and padded to a word
/// boundary; the terminating word is the first one containing a zero byte.
pub fn literal_string_words(operands: &[u32]) -> Option<usize> {
    for (i, word) in operands.iter().enumerate() {
        if word.to_le_bytes().contains(&0) {
            return Some(i + 1);
        }
    }
    None
}
