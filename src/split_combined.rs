//! Combined-image-sampler splitter.
//!
//! WebGPU-style backends reject bindings whose type bundles a texture with
//! its sampling state (`OpTypeSampledImage` behind a UniformConstant
//! pointer). This pass splits every such binding into a bare image binding
//! (keeping the original id and `(set, binding)`) plus a bare sampler binding
//! at a freshly allocated binding number, then patches every load to
//! reconstruct the combined value locally with `OpSampledImage` — which stays
//! legal inside a function body — under the original load's result id, so
//! downstream instructions are untouched. Helper-function plumbing
//! (`OpTypeFunction` signatures, `OpFunctionParameter` lists, `OpFunctionCall`
//! arguments) is widened with a matching sampler parameter.
//!
//! Arrays of combined image samplers split the same way: the binding becomes
//! an image array plus a sampler array, and every access chain into the
//! original array is mirrored with a second chain into the sampler array
//! using the same indices, so the per-element loads rewrite like scalar ones.

use hashbrown::HashMap;
use tracing::{debug, trace};

use crate::corrections::{BindingAllocator, BindingLocation, BindingRole, Correction, CorrectionMap};
use crate::error::TransformError;
use crate::module::{intern_type, Edit, Id, IdAllocator, Instruction, Module};
use crate::op::{self, Op};
use crate::SplitOutput;

/// Splits every combined-image-sampler binding into an image/sampler pair.
///
/// A module with no combined bindings is returned byte-identical with an
/// empty correction map, so the pass is idempotent.
pub fn split_combined_image_samplers(words: &[u32]) -> Result<SplitOutput, TransformError> {
    let module = Module::decode(words)?;
    let mut alloc = IdAllocator::new(&module);
    let mut corrections = CorrectionMap::default();
    let edits = plan(&module, &mut alloc, &mut corrections)?;
    if edits.is_empty() {
        return Ok(SplitOutput {
            words: words.to_vec(),
            corrections,
        });
    }

    let mut module = module;
    module.apply(edits, alloc.bound());
    Ok(SplitOutput {
        words: module.encode()?,
        corrections,
    })
}

/// A UniformConstant pointer to a combined image sampler type.
#[derive(Clone, Copy)]
struct CombinedPointer {
    /// Instruction index of the pointer declaration.
    index: usize,
    /// The pointer's id in the input module.
    ptr_id: Id,
    combined_type_id: Id,
    image_type_id: Id,
    /// Pointer-to-image id the binding ends up using: either this pointer
    /// retargeted in place, or a pre-existing pointer-to-image it was
    /// deduplicated against.
    image_ptr_id: Id,
}

/// A UniformConstant pointer to an array of combined image samplers.
#[derive(Clone, Copy)]
struct ArrayPointer {
    /// Instruction index of the pointer declaration.
    index: usize,
    ptr_id: Id,
    /// Instruction index of the array type declaration.
    array_index: usize,
    /// `TypeArray` or `TypeRuntimeArray`.
    array_op: Op,
    /// Length constant id; `None` for runtime arrays.
    length_id: Option<Id>,
    elem_combined_type_id: Id,
    elem_image_type_id: Id,
    /// Like [`CombinedPointer::image_ptr_id`], but for the array shape.
    image_ptr_id: Id,
    sampler_array_ptr_id: Id,
}

#[derive(Clone, Copy)]
enum VarKind {
    Scalar(CombinedPointer),
    Array(ArrayPointer),
}

/// A pointer-valued id (variable, parameter, or access-chain result) whose
/// loads get the split treatment; the original id becomes the image half.
struct SplitTarget {
    sampler_id: Id,
    combined_type_id: Id,
    image_type_id: Id,
}

/// An array binding (variable or parameter) that was split; access chains
/// into it are mirrored on the sampler array.
struct ArrayTarget {
    sampler_id: Id,
    elem_combined_type_id: Id,
    elem_image_type_id: Id,
}

fn plan(
    module: &Module,
    alloc: &mut IdAllocator,
    corrections: &mut CorrectionMap,
) -> Result<Vec<Edit>, TransformError> {
    let mut edits = Vec::new();

    // Locate every binding-visible combined image sampler type: a
    // UniformConstant pointer whose pointee is OpTypeSampledImage, or an
    // array (sized or runtime) of it.
    let mut combined_ptrs = Vec::new();
    let mut array_ptrs = Vec::new();
    for (index, inst) in module.instructions().iter().enumerate() {
        if inst.op != Op::TypePointer
            || inst.operands[1] != op::STORAGE_CLASS_UNIFORM_CONSTANT
        {
            continue;
        }
        let Some(pointee) = module.def(inst.operands[2]) else {
            continue;
        };
        match pointee.op {
            Op::TypeSampledImage => combined_ptrs.push(CombinedPointer {
                index,
                ptr_id: inst.operands[0],
                combined_type_id: pointee.operands[0],
                image_type_id: pointee.operands[1],
                image_ptr_id: inst.operands[0],
            }),
            Op::TypeArray | Op::TypeRuntimeArray => {
                let Some(element) = module.def(pointee.operands[1]) else {
                    continue;
                };
                match element.op {
                    Op::TypeSampledImage => array_ptrs.push(ArrayPointer {
                        index,
                        ptr_id: inst.operands[0],
                        array_index: module
                            .def_index(pointee.operands[0])
                            .expect("defined pointee has an index"),
                        array_op: pointee.op,
                        length_id: (pointee.op == Op::TypeArray)
                            .then(|| pointee.operands[2]),
                        elem_combined_type_id: element.operands[0],
                        elem_image_type_id: element.operands[1],
                        image_ptr_id: inst.operands[0],
                        sampler_array_ptr_id: 0,
                    }),
                    Op::TypeArray | Op::TypeRuntimeArray => {
                        if innermost_element(module, element)
                            .map_or(false, |e| e.op == Op::TypeSampledImage)
                        {
                            return Err(TransformError::unsupported(
                                index,
                                "nested arrays of combined image samplers cannot be split",
                            ));
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }
    if combined_ptrs.is_empty() && array_ptrs.is_empty() {
        return Ok(edits);
    }

    // All new type declarations go in front of the first combined type, which
    // is guaranteed to precede every pointer, variable, and parameter we
    // touch. Moving an existing declaration earlier (keeping its id) never
    // breaks definition order.
    let insertion_point = combined_ptrs
        .iter()
        .map(|p| module.def_index(p.combined_type_id).unwrap_or(p.index))
        .chain(
            array_ptrs
                .iter()
                .map(|p| module.def_index(p.elem_combined_type_id).unwrap_or(p.index)),
        )
        .min()
        .expect("at least one combined pointer");

    // Bare sampler type and its UniformConstant pointer: reuse (relocating
    // earlier if needed) or synthesize. Never duplicate a type declaration.
    let mut new_types = Vec::new();
    let sampler_type_id = match module.type_id(Op::TypeSampler, &[]) {
        Some(id) => {
            let def_index = module.def_index(id).expect("indexed type has a definition");
            if def_index > insertion_point {
                edits.push(Edit::Remove { index: def_index });
                new_types.push(Instruction::new(Op::TypeSampler, vec![id]));
            }
            id
        }
        None => {
            let id = alloc.next_id()?;
            new_types.push(Instruction::new(Op::TypeSampler, vec![id]));
            id
        }
    };
    let sampler_ptr_operands = [op::STORAGE_CLASS_UNIFORM_CONSTANT, sampler_type_id];
    let sampler_ptr_id = match module.type_id(Op::TypePointer, &sampler_ptr_operands) {
        Some(id) => {
            let def_index = module.def_index(id).expect("indexed type has a definition");
            if def_index > insertion_point {
                edits.push(Edit::Remove { index: def_index });
                new_types.push(Instruction::new(
                    Op::TypePointer,
                    vec![id, op::STORAGE_CLASS_UNIFORM_CONSTANT, sampler_type_id],
                ));
            }
            id
        }
        None => {
            let id = alloc.next_id()?;
            new_types.push(Instruction::new(
                Op::TypePointer,
                vec![id, op::STORAGE_CLASS_UNIFORM_CONSTANT, sampler_type_id],
            ));
            id
        }
    };
    if !new_types.is_empty() {
        edits.push(Edit::InsertBefore {
            index: insertion_point,
            insts: new_types,
        });
    }

    // Retarget each combined pointer to the underlying image type, reusing a
    // pre-existing (or earlier-planned) pointer-to-image instead of creating
    // a structural duplicate.
    let mut planned_image_ptrs: HashMap<Id, Id> = HashMap::new();
    let mut remapped_ptrs: HashMap<Id, Id> = HashMap::new();
    for ptr in &mut combined_ptrs {
        let image_ptr_operands = [op::STORAGE_CLASS_UNIFORM_CONSTANT, ptr.image_type_id];
        let existing = planned_image_ptrs
            .get(&ptr.image_type_id)
            .copied()
            .or_else(|| module.type_id(Op::TypePointer, &image_ptr_operands));
        match existing {
            Some(image_ptr_id) => {
                edits.push(Edit::Remove { index: ptr.index });
                if let Some(def_index) = module.def_index(image_ptr_id) {
                    if def_index > ptr.index {
                        // Declared later in the module; move it up so the
                        // retargeted variables still follow their type.
                        edits.push(Edit::Remove { index: def_index });
                        edits.push(Edit::InsertAfter {
                            index: ptr.index,
                            insts: vec![Instruction::new(
                                Op::TypePointer,
                                vec![
                                    image_ptr_id,
                                    op::STORAGE_CLASS_UNIFORM_CONSTANT,
                                    ptr.image_type_id,
                                ],
                            )],
                        });
                    }
                }
                remapped_ptrs.insert(ptr.ptr_id, image_ptr_id);
                ptr.image_ptr_id = image_ptr_id;
            }
            None => {
                edits.push(Edit::SetOperand {
                    index: ptr.index,
                    operand: 2,
                    value: ptr.image_type_id,
                });
                planned_image_ptrs.insert(ptr.image_type_id, ptr.ptr_id);
                ptr.image_ptr_id = ptr.ptr_id;
            }
        }
    }
    let ptr_by_id: HashMap<Id, CombinedPointer> =
        combined_ptrs.iter().map(|p| (p.ptr_id, *p)).collect();

    // Array pointers: intern image and sampler array types next to the
    // original array declaration (whose element and length dependencies all
    // precede it), then retarget the pointer the same way as the scalar case.
    let mut planned_types: HashMap<(u16, Vec<u32>), Id> = HashMap::new();
    let mut planned_array_ptrs: HashMap<Id, Id> = HashMap::new();
    for aptr in &mut array_ptrs {
        let mut image_array_operands = vec![aptr.elem_image_type_id];
        image_array_operands.extend(aptr.length_id);
        let image_array_id = intern_type(
            module,
            &mut planned_types,
            &mut edits,
            alloc,
            aptr.array_op,
            image_array_operands,
            aptr.array_index,
        )?;
        let mut sampler_array_operands = vec![sampler_type_id];
        sampler_array_operands.extend(aptr.length_id);
        let sampler_array_id = intern_type(
            module,
            &mut planned_types,
            &mut edits,
            alloc,
            aptr.array_op,
            sampler_array_operands,
            aptr.array_index,
        )?;

        let image_ptr_operands = [op::STORAGE_CLASS_UNIFORM_CONSTANT, image_array_id];
        let existing = planned_array_ptrs
            .get(&image_array_id)
            .copied()
            .or_else(|| module.type_id(Op::TypePointer, &image_ptr_operands));
        match existing {
            Some(image_ptr_id) => {
                edits.push(Edit::Remove { index: aptr.index });
                if let Some(def_index) = module.def_index(image_ptr_id) {
                    if def_index > aptr.index {
                        edits.push(Edit::Remove { index: def_index });
                        edits.push(Edit::InsertAfter {
                            index: aptr.index,
                            insts: vec![Instruction::new(
                                Op::TypePointer,
                                vec![
                                    image_ptr_id,
                                    op::STORAGE_CLASS_UNIFORM_CONSTANT,
                                    image_array_id,
                                ],
                            )],
                        });
                    }
                }
                remapped_ptrs.insert(aptr.ptr_id, image_ptr_id);
                aptr.image_ptr_id = image_ptr_id;
            }
            None => {
                edits.push(Edit::SetOperand {
                    index: aptr.index,
                    operand: 2,
                    value: image_array_id,
                });
                planned_array_ptrs.insert(image_array_id, aptr.ptr_id);
                aptr.image_ptr_id = aptr.ptr_id;
            }
        }
        aptr.sampler_array_ptr_id = intern_type(
            module,
            &mut planned_types,
            &mut edits,
            alloc,
            Op::TypePointer,
            vec![op::STORAGE_CLASS_UNIFORM_CONSTANT, sampler_array_id],
            aptr.index,
        )?;
    }
    let array_ptr_by_id: HashMap<Id, ArrayPointer> =
        array_ptrs.iter().map(|p| (p.ptr_id, *p)).collect();

    // Collect combined variables, ordered by (set, binding) so sampler
    // binding numbers are assigned deterministically.
    let mut variables = Vec::new();
    for (index, inst) in module.instructions().iter().enumerate() {
        if inst.op != Op::Variable {
            continue;
        }
        let kind = if let Some(ptr) = ptr_by_id.get(&inst.operands[0]) {
            VarKind::Scalar(*ptr)
        } else if let Some(aptr) = array_ptr_by_id.get(&inst.operands[0]) {
            VarKind::Array(*aptr)
        } else {
            continue;
        };
        if inst.operands[2] != op::STORAGE_CLASS_UNIFORM_CONSTANT {
            return Err(TransformError::unsupported(
                index,
                "combined image sampler variable outside UniformConstant storage",
            ));
        }
        let var_id = inst.operands[1];
        let Some((set, binding)) = module.binding_location(var_id) else {
            return Err(TransformError::unsupported(
                index,
                "combined image sampler variable without descriptor set/binding decorations",
            ));
        };
        variables.push((set, binding, index, var_id, kind));
    }
    variables.sort_by_key(|&(set, binding, index, _, _)| (set, binding, index));

    let mut binding_alloc = BindingAllocator::new(
        module
            .resource_bindings()
            .into_iter()
            .map(|(_, set, binding)| (set, binding)),
    );

    let mut targets: HashMap<Id, SplitTarget> = HashMap::new();
    let mut array_targets: HashMap<Id, ArrayTarget> = HashMap::new();
    for &(set, binding, index, var_id, kind) in &variables {
        let sampler_var_id = alloc.next_id()?;
        let sampler_binding = binding_alloc.allocate_above(set, binding);
        let (orig_ptr_id, image_ptr_id, sampler_var_type) = match kind {
            VarKind::Scalar(ptr) => (ptr.ptr_id, ptr.image_ptr_id, sampler_ptr_id),
            VarKind::Array(aptr) => (aptr.ptr_id, aptr.image_ptr_id, aptr.sampler_array_ptr_id),
        };

        if image_ptr_id != orig_ptr_id {
            // The combined pointer was deduplicated against an existing
            // pointer-to-image; retarget the variable to the survivor.
            edits.push(Edit::SetOperand {
                index,
                operand: 0,
                value: image_ptr_id,
            });
        }

        edits.push(Edit::InsertAfter {
            index,
            insts: vec![Instruction::new(
                Op::Variable,
                vec![
                    sampler_var_type,
                    sampler_var_id,
                    op::STORAGE_CLASS_UNIFORM_CONSTANT,
                ],
            )],
        });

        // Duplicate the variable's decorations onto the sampler, swapping in
        // the fresh binding number.
        for &dec_index in module.decoration_indices(var_id) {
            let mut dec = module.instructions()[dec_index].clone();
            dec.operands[0] = sampler_var_id;
            if dec.operands[1] == op::DECORATION_BINDING {
                if let Some(value) = dec.operands.get_mut(2) {
                    *value = sampler_binding;
                }
            }
            edits.push(Edit::InsertAfter {
                index: dec_index,
                insts: vec![dec],
            });
        }

        interface_additions(module, var_id, sampler_var_id, &mut edits);

        let original = BindingLocation::new(set, binding);
        corrections.record(
            original,
            Correction {
                location: original,
                role: BindingRole::Texture,
            },
        );
        corrections.record(
            original,
            Correction {
                location: BindingLocation::new(set, sampler_binding),
                role: BindingRole::Sampler,
            },
        );
        trace!(
            set,
            binding,
            sampler_binding,
            var_id,
            sampler_var_id,
            "split combined image sampler binding"
        );

        match kind {
            VarKind::Scalar(ptr) => {
                targets.insert(
                    var_id,
                    SplitTarget {
                        sampler_id: sampler_var_id,
                        combined_type_id: ptr.combined_type_id,
                        image_type_id: ptr.image_type_id,
                    },
                );
            }
            VarKind::Array(aptr) => {
                array_targets.insert(
                    var_id,
                    ArrayTarget {
                        sampler_id: sampler_var_id,
                        elem_combined_type_id: aptr.elem_combined_type_id,
                        elem_image_type_id: aptr.elem_image_type_id,
                    },
                );
            }
        }
    }

    // Widen helper-function signatures: every parameter of a combined pointer
    // type gains a sampler parameter right after it.
    for (index, inst) in module.instructions().iter().enumerate() {
        if inst.op != Op::FunctionParameter {
            continue;
        }
        if let Some(ptr) = ptr_by_id.get(&inst.operands[0]) {
            let sampler_param_id = alloc.next_id()?;
            if let Some(&image_ptr_id) = remapped_ptrs.get(&inst.operands[0]) {
                edits.push(Edit::SetOperand {
                    index,
                    operand: 0,
                    value: image_ptr_id,
                });
            }
            edits.push(Edit::InsertAfter {
                index,
                insts: vec![Instruction::new(
                    Op::FunctionParameter,
                    vec![sampler_ptr_id, sampler_param_id],
                )],
            });
            targets.insert(
                inst.operands[1],
                SplitTarget {
                    sampler_id: sampler_param_id,
                    combined_type_id: ptr.combined_type_id,
                    image_type_id: ptr.image_type_id,
                },
            );
        } else if let Some(aptr) = array_ptr_by_id.get(&inst.operands[0]) {
            let sampler_param_id = alloc.next_id()?;
            if let Some(&image_ptr_id) = remapped_ptrs.get(&inst.operands[0]) {
                edits.push(Edit::SetOperand {
                    index,
                    operand: 0,
                    value: image_ptr_id,
                });
            }
            edits.push(Edit::InsertAfter {
                index,
                insts: vec![Instruction::new(
                    Op::FunctionParameter,
                    vec![aptr.sampler_array_ptr_id, sampler_param_id],
                )],
            });
            array_targets.insert(
                inst.operands[1],
                ArrayTarget {
                    sampler_id: sampler_param_id,
                    elem_combined_type_id: aptr.elem_combined_type_id,
                    elem_image_type_id: aptr.elem_image_type_id,
                },
            );
        }
    }

    for (index, inst) in module.instructions().iter().enumerate() {
        match inst.op {
            Op::TypeFunction => {
                // operands: result, return type, parameter types...
                for pos in 2..inst.operands.len() {
                    let sampler_type = if ptr_by_id.contains_key(&inst.operands[pos]) {
                        sampler_ptr_id
                    } else if let Some(aptr) = array_ptr_by_id.get(&inst.operands[pos]) {
                        aptr.sampler_array_ptr_id
                    } else {
                        continue;
                    };
                    if let Some(&image_ptr_id) = remapped_ptrs.get(&inst.operands[pos]) {
                        edits.push(Edit::SetOperand {
                            index,
                            operand: pos,
                            value: image_ptr_id,
                        });
                    }
                    edits.push(Edit::InsertOperand {
                        index,
                        at: pos + 1,
                        value: sampler_type,
                    });
                }
            }
            Op::FunctionCall => {
                // operands: result type, result, function, arguments...
                for pos in 3..inst.operands.len() {
                    let sampler_id = targets
                        .get(&inst.operands[pos])
                        .map(|t| t.sampler_id)
                        .or_else(|| array_targets.get(&inst.operands[pos]).map(|t| t.sampler_id));
                    if let Some(sampler_id) = sampler_id {
                        edits.push(Edit::InsertOperand {
                            index,
                            at: pos + 1,
                            value: sampler_id,
                        });
                    }
                }
            }
            Op::AccessChain => {
                // The chain's element-pointer result type is one of the
                // retargeted combined pointers; only a remap needs patching.
                if let Some(&image_ptr_id) = remapped_ptrs.get(&inst.operands[0]) {
                    edits.push(Edit::SetOperand {
                        index,
                        operand: 0,
                        value: image_ptr_id,
                    });
                }
                let Some(target) = array_targets.get(&inst.operands[2]) else {
                    continue;
                };
                // Mirror the chain on the sampler array with the same
                // indices; the original chain result then rewrites like a
                // scalar split variable (chains precede their loads, so the
                // load sweep below picks this up).
                let sampler_chain_id = alloc.next_id()?;
                let mut chain_operands = vec![sampler_ptr_id, sampler_chain_id, target.sampler_id];
                chain_operands.extend_from_slice(&inst.operands[3..]);
                edits.push(Edit::InsertAfter {
                    index,
                    insts: vec![Instruction::new(Op::AccessChain, chain_operands)],
                });
                targets.insert(
                    inst.operands[1],
                    SplitTarget {
                        sampler_id: sampler_chain_id,
                        combined_type_id: target.elem_combined_type_id,
                        image_type_id: target.elem_image_type_id,
                    },
                );
            }
            Op::Load => {
                if array_targets.contains_key(&inst.operands[2]) {
                    return Err(TransformError::unsupported(
                        index,
                        "whole-array load of a combined image sampler array",
                    ));
                }
                let Some(target) = targets.get(&inst.operands[2]) else {
                    continue;
                };
                // The load keeps working on the original pointer, but now
                // yields the bare image under a fresh id; the spliced-in
                // sampler load and OpSampledImage rebuild the combined value
                // under the original result id.
                let image_load_id = alloc.next_id()?;
                let sampler_load_id = alloc.next_id()?;
                let combined_result_id = inst.operands[1];
                edits.push(Edit::SetOperand {
                    index,
                    operand: 0,
                    value: target.image_type_id,
                });
                edits.push(Edit::SetOperand {
                    index,
                    operand: 1,
                    value: image_load_id,
                });
                edits.push(Edit::InsertAfter {
                    index,
                    insts: vec![
                        Instruction::new(
                            Op::Load,
                            vec![sampler_type_id, sampler_load_id, target.sampler_id],
                        ),
                        Instruction::new(
                            Op::SampledImage,
                            vec![
                                target.combined_type_id,
                                combined_result_id,
                                image_load_id,
                                sampler_load_id,
                            ],
                        ),
                    ],
                });
            }
            _ => {}
        }
    }

    verify_consumers(module, &targets, &array_targets)?;

    debug!(
        bindings = variables.len(),
        pointer_types = combined_ptrs.len(),
        array_pointer_types = array_ptrs.len(),
        "planned combined image sampler split"
    );
    Ok(edits)
}

/// The non-array type at the bottom of a (possibly nested) array type.
fn innermost_element<'a>(
    module: &'a Module,
    mut element: &'a Instruction,
) -> Option<&'a Instruction> {
    loop {
        match element.op {
            Op::TypeArray | Op::TypeRuntimeArray => {
                element = module.def(element.operands[1])?;
            }
            _ => return Some(element),
        }
    }
}

/// Appends the new sampler variable to the interface list of every entry
/// point that references the original variable. Required since SPIR-V 1.4,
/// where interface lists cover UniformConstant variables too.
fn interface_additions(module: &Module, var_id: Id, new_id: Id, edits: &mut Vec<Edit>) {
    if module.version < op::VERSION_1_4 {
        return;
    }
    for (index, inst) in module.instructions().iter().enumerate() {
        if inst.op != Op::EntryPoint {
            continue;
        }
        let Some(start) = Module::entry_point_interface_start(inst) else {
            continue;
        };
        if inst.operands[start..].contains(&var_id) {
            edits.push(Edit::InsertOperand {
                index,
                at: inst.operands.len(),
                value: new_id,
            });
        }
    }
}

/// Rejects consumptions of a split id this pass cannot rewrite: stores,
/// initializers, access chains into a scalar binding (chains into array
/// bindings are mirrored instead), and any opcode the engine has no schema
/// for, whose operands could reference the id in a position no rewrite
/// covers.
fn verify_consumers(
    module: &Module,
    targets: &HashMap<Id, SplitTarget>,
    array_targets: &HashMap<Id, ArrayTarget>,
) -> Result<(), TransformError> {
    let is_split =
        |id: &Id| targets.contains_key(id) || array_targets.contains_key(id);
    for (index, inst) in module.instructions().iter().enumerate() {
        let bad = match inst.op {
            Op::Store => is_split(&inst.operands[0]) || is_split(&inst.operands[1]),
            Op::AccessChain => targets.contains_key(&inst.operands[2]),
            Op::Variable => inst.operands.get(3).map_or(false, |init| is_split(init)),
            Op::Unknown(raw) if !op::is_metadata_opcode(raw) => {
                inst.operands.iter().any(|word| is_split(word))
            }
            _ => false,
        };
        if bad {
            return Err(TransformError::unsupported(
                index,
                "combined image sampler consumed outside load/call/decoration positions",
            ));
        }
    }
    Ok(())
}
