use crate::op;

/// Assembles a minimal raw SPIR-V word stream.
///
/// The resulting buffer has a valid header (magic, version, generator 0,
/// bound, schema 0) followed by the pushed instructions. The bound is
/// maintained automatically from [`ModuleBuilder::id`]; tests that need an
/// out-of-range id can still push one manually and override the bound with
/// [`ModuleBuilder::with_bound`].
pub struct ModuleBuilder {
    version: u32,
    bound_override: Option<u32>,
    next_id: u32,
    words: Vec<u32>,
}

impl ModuleBuilder {
    /// A SPIR-V 1.0 module with no instructions.
    pub fn new() -> Self {
        Self::with_version(0x0001_0000)
    }

    /// Like [`ModuleBuilder::new`] with an explicit header version word.
    pub fn with_version(version: u32) -> Self {
        ModuleBuilder {
            version,
            bound_override: None,
            next_id: 1,
            words: Vec::new(),
        }
    }

    /// Forces the header bound instead of deriving it from allocated ids.
    pub fn with_bound(mut self, bound: u32) -> Self {
        self.bound_override = Some(bound);
        self
    }

    /// Allocates a fresh result id.
    pub fn id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Appends one instruction: `(word_count << 16) | opcode`, then operands.
    pub fn inst(&mut self, opcode: u16, operands: &[u32]) {
        let word_count =
            u32::try_from(operands.len() + 1).expect("instruction word count fits in u32");
        self.words.push((word_count << 16) | u32::from(opcode));
        self.words.extend_from_slice(operands);
    }

    /// Packs a NUL-terminated literal string into operand words.
    pub fn string_operands(text: &str) -> Vec<u32> {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(0);
        while bytes.len() % 4 != 0 {
            bytes.push(0);
        }
        bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// Serializes the header plus all pushed instructions.
    pub fn build(self) -> Vec<u32> {
        let bound = self.bound_override.unwrap_or(self.next_id);
        let mut out = Vec::with_capacity(op::HEADER_WORDS + self.words.len());
        out.push(op::SPIRV_MAGIC);
        out.push(self.version);
        out.push(0); // generator
        out.push(bound);
        out.push(0); // schema
        out.extend_from_slice(&self.words);
        out
    }
}

impl Default for ModuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}
