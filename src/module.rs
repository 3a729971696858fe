//! In-memory SPIR-V module model.
//!
//! [`Module::decode`] turns a word buffer into a header plus an ordered
//! instruction list and maintains three auxiliary indices over it: result id
//! to defining instruction, structural type shape to type id (the dedup
//! table), and decoration target to decoration instructions. The rewrite
//! passes never hand-edit the instruction list; they plan a batch of
//! [`Edit`]s against the immutable module and commit it with
//! [`Module::apply`], which rebuilds the indices. That keeps the indices from
//! rotting and means a pass that fails during planning leaves the module
//! untouched.

use hashbrown::HashMap;

use crate::error::TransformError;
use crate::op::{self, Op};

/// A module-scoped SPIR-V result id.
pub type Id = u32;

/// One decoded instruction: opcode plus raw operand words.
///
/// Operands include the result-type and result ids where the opcode has them
/// (see [`Op::schema`]); the word-count prefix is recomputed at encode time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// The decoded opcode.
    pub op: Op,
    /// Raw operand words, excluding the word-count/opcode prefix.
    pub operands: Vec<u32>,
}

impl Instruction {
    /// Builds an instruction from an opcode and its operand words.
    pub fn new(op: Op, operands: Vec<u32>) -> Self {
        Instruction { op, operands }
    }

    /// The instruction's result id, if its opcode declares one.
    pub fn result_id(&self) -> Option<Id> {
        let schema = self.op.schema()?;
        if schema.has_result_type {
            schema.has_result.then(|| self.operands[1])
        } else {
            schema.has_result.then(|| self.operands[0])
        }
    }

    /// The instruction's result type id, if its opcode declares one.
    pub fn result_type_id(&self) -> Option<Id> {
        let schema = self.op.schema()?;
        schema.has_result_type.then(|| self.operands[0])
    }
}

/// Structural key of a type declaration: raw opcode plus all operands after
/// the result id. Two type instructions with equal keys declare the same type.
type TypeKey = (u16, Vec<u32>);

/// A planned mutation against the instruction list.
///
/// Indices refer to the instruction list as it was when the plan was built;
/// [`Module::apply`] resolves all edits in one batch so earlier insertions
/// never invalidate later indices.
#[derive(Debug, Clone)]
pub enum Edit {
    /// Splice instructions immediately before `index`.
    InsertBefore { index: usize, insts: Vec<Instruction> },
    /// Splice instructions immediately after `index`.
    InsertAfter { index: usize, insts: Vec<Instruction> },
    /// Remove the instruction at `index`.
    Remove { index: usize },
    /// Overwrite one operand word in place.
    SetOperand {
        index: usize,
        operand: usize,
        value: u32,
    },
    /// Insert one operand word at operand position `at` (shifting the rest).
    InsertOperand {
        index: usize,
        at: usize,
        value: u32,
    },
}

/// A decoded SPIR-V module.
#[derive(Debug, Clone)]
pub struct Module {
    /// Raw version word from the header (e.g. `0x0001_0000` for SPIR-V 1.0).
    pub version: u32,
    /// Generator magic, carried through verbatim.
    pub generator: u32,
    /// Instruction schema word, carried through verbatim (always 0 today).
    pub schema: u32,
    bound: u32,
    instructions: Vec<Instruction>,
    defs: HashMap<Id, usize>,
    types: HashMap<TypeKey, Id>,
    decorations: HashMap<Id, Vec<usize>>,
}

impl Module {
    /// Decodes a little-endian SPIR-V word buffer.
    ///
    /// The input is treated as **untrusted**: the header, every instruction's
    /// word count, and every known opcode's operand count are validated, and
    /// every known result id must be strictly below the header bound.
    pub fn decode(words: &[u32]) -> Result<Module, TransformError> {
        if words.len() < op::HEADER_WORDS {
            return Err(TransformError::malformed(
                0,
                format!(
                    "need at least {} header words, got {}",
                    op::HEADER_WORDS,
                    words.len()
                ),
            ));
        }

        let magic = words[0];
        if magic != op::SPIRV_MAGIC {
            let message = if magic == op::SPIRV_MAGIC.swap_bytes() {
                "big-endian module; only little-endian SPIR-V is supported".to_owned()
            } else {
                format!("bad magic 0x{magic:08x}, expected 0x{:08x}", op::SPIRV_MAGIC)
            };
            return Err(TransformError::malformed(0, message));
        }

        let version = words[1];
        let generator = words[2];
        let bound = words[3];
        let schema = words[4];
        if bound == 0 {
            return Err(TransformError::malformed(3, "id bound must be nonzero"));
        }

        let mut instructions = Vec::new();
        let mut word_index = op::HEADER_WORDS;
        while word_index < words.len() {
            let first = words[word_index];
            let word_count = (first >> 16) as usize;
            let raw_op = (first & 0xFFFF) as u16;
            if word_count == 0 {
                return Err(TransformError::malformed(
                    word_index,
                    format!("instruction with zero word count (opcode {raw_op})"),
                ));
            }
            if word_index + word_count > words.len() {
                return Err(TransformError::malformed(
                    word_index,
                    format!(
                        "instruction length {word_count} exceeds remaining {} words",
                        words.len() - word_index
                    ),
                ));
            }

            let operand_count = word_count - 1;
            let operation = Op::from_raw(raw_op);
            if let Some(schema) = operation.schema() {
                let max_ok = schema.max_operands.map_or(true, |max| operand_count <= max);
                if operand_count < schema.min_operands || !max_ok {
                    return Err(TransformError::malformed(
                        word_index,
                        format!(
                            "opcode {raw_op} has {operand_count} operands, expected {}{}",
                            schema.min_operands,
                            match schema.max_operands {
                                Some(max) if max == schema.min_operands => String::new(),
                                Some(max) => format!("..={max}"),
                                None => "+".to_owned(),
                            }
                        ),
                    ));
                }
            }

            let operands = words[word_index + 1..word_index + word_count].to_vec();
            let inst = Instruction::new(operation, operands);
            if let Some(result) = inst.result_id() {
                if result >= bound {
                    return Err(TransformError::malformed(
                        word_index,
                        format!("result id {result} is not below the header bound {bound}"),
                    ));
                }
            }
            instructions.push(inst);
            word_index += word_count;
        }

        let mut module = Module {
            version,
            generator,
            schema,
            bound,
            instructions,
            defs: HashMap::new(),
            types: HashMap::new(),
            decorations: HashMap::new(),
        };
        module.reindex();
        Ok(module)
    }

    /// Serializes the module back to a word buffer.
    ///
    /// For a module that was decoded and never mutated this reproduces the
    /// input byte for byte.
    pub fn encode(&self) -> Result<Vec<u32>, TransformError> {
        let body: usize = self.instructions.iter().map(|i| 1 + i.operands.len()).sum();
        let mut words = Vec::with_capacity(op::HEADER_WORDS + body);
        words.push(op::SPIRV_MAGIC);
        words.push(self.version);
        words.push(self.generator);
        words.push(self.bound);
        words.push(self.schema);

        for inst in &self.instructions {
            let word_count = 1 + inst.operands.len();
            if word_count > u16::MAX as usize {
                return Err(TransformError::malformed(
                    words.len(),
                    format!(
                        "instruction with {} operands does not fit the 16-bit word count",
                        inst.operands.len()
                    ),
                ));
            }
            words.push(((word_count as u32) << 16) | inst.op.raw() as u32);
            words.extend_from_slice(&inst.operands);
        }
        Ok(words)
    }

    /// The exclusive upper limit on ids in use.
    pub fn bound(&self) -> u32 {
        self.bound
    }

    /// The decoded instruction list, in module order.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Index of the instruction defining `id`, if `id` has a known definition.
    pub fn def_index(&self, id: Id) -> Option<usize> {
        self.defs.get(&id).copied()
    }

    /// The instruction defining `id`.
    pub fn def(&self, id: Id) -> Option<&Instruction> {
        self.def_index(id).map(|i| &self.instructions[i])
    }

    /// Looks up a type id by structural shape in the dedup table.
    ///
    /// `operands` are the type instruction's operands *after* the result id
    /// (e.g. `[storage_class, pointee]` for a pointer).
    pub fn type_id(&self, op: Op, operands: &[u32]) -> Option<Id> {
        self.types.get(&(op.raw(), operands.to_vec())).copied()
    }

    /// Indices of all `OpDecorate` instructions targeting `id`.
    pub fn decoration_indices(&self, id: Id) -> &[usize] {
        self.decorations.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The decorated value of `decoration` on `id`, if present.
    ///
    /// A decoration instruction missing its literal value (legal per the
    /// loose `OpDecorate` schema) is treated as absent rather than malformed.
    pub fn decoration(&self, id: Id, decoration: u32) -> Option<u32> {
        self.decoration_indices(id).iter().find_map(|&index| {
            let inst = &self.instructions[index];
            if inst.operands[1] == decoration {
                inst.operands.get(2).copied()
            } else {
                None
            }
        })
    }

    /// `(descriptor set, binding)` of `id`, when both decorations are present.
    pub fn binding_location(&self, id: Id) -> Option<(u32, u32)> {
        let set = self.decoration(id, op::DECORATION_DESCRIPTOR_SET)?;
        let binding = self.decoration(id, op::DECORATION_BINDING)?;
        Some((set, binding))
    }

    /// Every `(variable id, set, binding)` triple decorated in the module, in
    /// instruction order of the `DescriptorSet` decoration.
    pub fn resource_bindings(&self) -> Vec<(Id, u32, u32)> {
        let mut out = Vec::new();
        for inst in &self.instructions {
            if inst.op == Op::Decorate && inst.operands[1] == op::DECORATION_DESCRIPTOR_SET {
                let target = inst.operands[0];
                let Some(&set) = inst.operands.get(2) else {
                    continue;
                };
                if let Some(binding) = self.decoration(target, op::DECORATION_BINDING) {
                    out.push((target, set, binding));
                }
            }
        }
        out
    }

    /// Operand index of the first interface id of an `OpEntryPoint`
    /// instruction, i.e. the position just past the entry point name literal.
    pub fn entry_point_interface_start(inst: &Instruction) -> Option<usize> {
        debug_assert_eq!(inst.op, Op::EntryPoint);
        let name_words = op::literal_string_words(&inst.operands[2..])?;
        Some(2 + name_words)
    }

    /// Commits a batch of edits planned against the current instruction list
    /// and raises the id bound to `new_bound`.
    ///
    /// Edit indices must refer to existing instructions and `new_bound` must
    /// not shrink the id space; both are internal invariants of the passes,
    /// so violations are programming errors, not input errors.
    pub fn apply(&mut self, edits: Vec<Edit>, new_bound: u32) {
        assert!(new_bound >= self.bound, "id bound must not shrink");

        #[derive(Default)]
        struct Slot {
            before: Vec<Instruction>,
            after: Vec<Instruction>,
            removed: bool,
            operand_sets: Vec<(usize, u32)>,
            operand_inserts: Vec<(usize, u32)>,
        }

        let mut slots: HashMap<usize, Slot> = HashMap::new();
        for edit in edits {
            match edit {
                Edit::InsertBefore { index, mut insts } => {
                    assert!(index < self.instructions.len());
                    slots.entry(index).or_default().before.append(&mut insts);
                }
                Edit::InsertAfter { index, mut insts } => {
                    assert!(index < self.instructions.len());
                    slots.entry(index).or_default().after.append(&mut insts);
                }
                Edit::Remove { index } => {
                    assert!(index < self.instructions.len());
                    slots.entry(index).or_default().removed = true;
                }
                Edit::SetOperand {
                    index,
                    operand,
                    value,
                } => {
                    assert!(operand < self.instructions[index].operands.len());
                    slots
                        .entry(index)
                        .or_default()
                        .operand_sets
                        .push((operand, value));
                }
                Edit::InsertOperand { index, at, value } => {
                    assert!(at <= self.instructions[index].operands.len());
                    slots
                        .entry(index)
                        .or_default()
                        .operand_inserts
                        .push((at, value));
                }
            }
        }

        let old = std::mem::take(&mut self.instructions);
        let mut new = Vec::with_capacity(old.len() + slots.len());
        for (index, mut inst) in old.into_iter().enumerate() {
            let Some(slot) = slots.get_mut(&index) else {
                new.push(inst);
                continue;
            };
            new.append(&mut slot.before);
            if !slot.removed {
                for &(operand, value) in &slot.operand_sets {
                    inst.operands[operand] = value;
                }
                // Highest position first so earlier inserts don't shift the
                // targets of later ones.
                slot.operand_inserts.sort_by(|a, b| b.0.cmp(&a.0));
                for &(at, value) in &slot.operand_inserts {
                    inst.operands.insert(at, value);
                }
                new.push(inst);
            }
            new.append(&mut slot.after);
        }

        self.instructions = new;
        self.bound = new_bound;
        self.reindex();
    }

    fn reindex(&mut self) {
        self.defs.clear();
        self.types.clear();
        self.decorations.clear();
        for (index, inst) in self.instructions.iter().enumerate() {
            if let Some(result) = inst.result_id() {
                self.defs.insert(result, index);
            }
            if inst.op.is_type() {
                // Type ops carry their result in operand 0.
                let key = (inst.op.raw(), inst.operands[1..].to_vec());
                self.types.insert(key, inst.operands[0]);
            }
            if inst.op == Op::Decorate {
                self.decorations
                    .entry(inst.operands[0])
                    .or_default()
                    .push(index);
            }
        }
    }
}

/// Issues fresh ids strictly above a module's current bound.
///
/// The allocator is owned by a single pass invocation; the raised bound is
/// written back to the module only when the pass commits its edits.
#[derive(Debug)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    /// Creates an allocator seeded from the module's current bound.
    pub fn new(module: &Module) -> Self {
        IdAllocator {
            next: module.bound(),
        }
    }

    /// Returns a fresh id, or [`TransformError::IdSpaceExhausted`] if the
    /// 32-bit id space is full.
    pub fn next_id(&mut self) -> Result<Id, TransformError> {
        let id = self.next;
        self.next = self
            .next
            .checked_add(1)
            .ok_or(TransformError::IdSpaceExhausted { bound: id })?;
        Ok(id)
    }

    /// The exclusive upper limit covering every id handed out so far.
    pub fn bound(&self) -> u32 {
        self.next
    }
}

/// Returns the id of the type with the given shape, ensuring it is declared
/// no later than `insert_after`: reuses an existing declaration (relocating
/// it earlier if it appears too late, which never breaks def-before-use),
/// otherwise declares a fresh one. The cache keeps one id per shape across
/// the whole plan.
pub(crate) fn intern_type(
    module: &Module,
    planned: &mut HashMap<(u16, Vec<u32>), Id>,
    edits: &mut Vec<Edit>,
    alloc: &mut IdAllocator,
    op: Op,
    operands: Vec<u32>,
    insert_after: usize,
) -> Result<Id, TransformError> {
    let key = (op.raw(), operands.clone());
    if let Some(&id) = planned.get(&key) {
        return Ok(id);
    }
    let id = match module.type_id(op, &operands) {
        Some(id) => {
            let def_index = module.def_index(id).expect("known type is defined");
            if def_index > insert_after {
                edits.push(Edit::Remove { index: def_index });
                edits.push(Edit::InsertAfter {
                    index: insert_after,
                    insts: vec![type_inst(op, id, &operands)],
                });
            }
            id
        }
        None => {
            let id = alloc.next_id()?;
            edits.push(Edit::InsertAfter {
                index: insert_after,
                insts: vec![type_inst(op, id, &operands)],
            });
            id
        }
    };
    planned.insert(key, id);
    Ok(id)
}

fn type_inst(op: Op, id: Id, operands: &[u32]) -> Instruction {
    let mut full = Vec::with_capacity(operands.len() + 1);
    full.push(id);
    full.extend_from_slice(operands);
    Instruction::new(op, full)
}
