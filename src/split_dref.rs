//! Depth-reference texture splitter.
//!
//! Strict backends require the texture behind a depth-comparison sample
//! (`OpImageSample*Dref*`, `OpImage*DrefGather`) to be explicitly depth-marked
//! in its `OpTypeImage` declaration. This pass traces every sample operation
//! back through `OpSampledImage` / `OpLoad` to the declaring UniformConstant
//! variable. A variable only ever dref-sampled is retyped in place to a
//! depth-marked clone of its type chain (binding unchanged, but still
//! recorded). A variable sampled both ways cannot share one type, so it is
//! split: a parallel depth-typed variable at a fresh binding takes over the
//! dref-path loads.

use hashbrown::{HashMap, HashSet};
use tracing::{debug, trace};

use crate::corrections::{BindingAllocator, BindingLocation, BindingRole, Correction, CorrectionMap};
use crate::error::TransformError;
use crate::module::{intern_type, Edit, Id, IdAllocator, Instruction, Module};
use crate::op::{self, Op};
use crate::SplitOutput;

/// Rewrites depth-comparison sampling against non-depth-marked textures into
/// the explicit depth-comparison form.
///
/// Textures already depth-marked are untouched and produce no correction
/// entries; a module with no rewrites is returned byte-identical.
pub fn split_depth_reference_textures(words: &[u32]) -> Result<SplitOutput, TransformError> {
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variant {
    Plain,
    Dref,
}

/// One sample operation traced back to its declaring variable.
struct SampleUse {
    variant: Variant,
    var_id: Id,
    load_index: usize,
}

/// The type chain of a dref-sampled variable, from pointer down to the image.
struct VarChain {
    var_index: usize,
    var_id: Id,
    ptr_index: usize,
    /// `Some` when the variable holds a combined `OpTypeSampledImage`;
    /// `None` when it holds a bare `OpTypeImage`.
    combined: Option<(usize, Id)>,
    image_index: usize,
    image_operands: Vec<u32>,
    depth: u32,
}

fn plan(
    module: &Module,
    alloc: &mut IdAllocator,
    corrections: &mut CorrectionMap,
) -> Result<Vec<Edit>, TransformError> {
    let mut edits = Vec::new();
    let insts = module.instructions();

    // Trace every sample operation to its variable. Plain samples that do
    // not resolve to a variable are ignored (they need no rewrite); dref
    // samples that do not resolve are patterns we cannot rewrite.
    let mut uses = Vec::new();
    let mut load_variants: HashMap<usize, (bool, bool)> = HashMap::new();
    let mut simg_variants: HashMap<usize, (bool, bool)> = HashMap::new();
    for (index, inst) in insts.iter().enumerate() {
        let variant = if inst.op.is_dref_sample() {
            Variant::Dref
        } else if inst.op.is_plain_sample() {
            Variant::Plain
        } else {
            continue;
        };

        match trace_sample(module, inst.operands[2]) {
            Some(trace) => {
                if let Some(simg_index) = trace.sampled_image_index {
                    let flags = simg_variants.entry(simg_index).or_default();
                    mark(flags, variant);
                }
                let flags = load_variants.entry(trace.load_index).or_default();
                mark(flags, variant);
                uses.push(SampleUse {
                    variant,
                    var_id: trace.var_id,
                    load_index: trace.load_index,
                });
            }
            None if variant == Variant::Dref => {
                return Err(TransformError::unsupported(
                    index,
                    "depth-comparison sample does not trace back to a UniformConstant variable",
                ));
            }
            None => {}
        }
    }
    if uses.iter().all(|u| u.variant == Variant::Plain) {
        return Ok(edits);
    }

    // A load (or locally constructed sampled image) feeding both dref and
    // non-dref samples cannot be split two ways.
    for (map, what) in [
        (&load_variants, "load"),
        (&simg_variants, "sampled-image value"),
    ] {
        if let Some((&index, _)) = map.iter().find(|(_, flags)| flags.0 && flags.1) {
            return Err(TransformError::unsupported(
                index,
                format!("{what} feeds both depth-comparison and ordinary samples"),
            ));
        }
    }

    // Classify variables by how they are sampled.
    let mut var_flags: HashMap<Id, (bool, bool)> = HashMap::new();
    let mut dref_loads_of_var: HashMap<Id, HashSet<usize>> = HashMap::new();
    for sample_use in &uses {
        let flags = var_flags.entry(sample_use.var_id).or_default();
        mark(flags, sample_use.variant);
        if sample_use.variant == Variant::Dref {
            dref_loads_of_var
                .entry(sample_use.var_id)
                .or_default()
                .insert(sample_use.load_index);
        }
    }

    // Resolve the type chain of every dref-sampled variable; drop the ones
    // whose image type is already depth-marked (nothing to do).
    let mut chains = Vec::new();
    for (&var_id, &(dref, _plain)) in &var_flags {
        if !dref {
            continue;
        }
        let chain = resolve_chain(module, var_id)?;
        if chain.depth != op::IMAGE_DEPTH {
            chains.push(chain);
        }
    }
    if chains.is_empty() {
        return Ok(edits);
    }

    // Deterministic processing and binding-allocation order.
    let mut located = Vec::new();
    for chain in chains {
        let Some((set, binding)) = module.binding_location(chain.var_id) else {
            return Err(TransformError::unsupported(
                chain.var_index,
                "depth-sampled variable without descriptor set/binding decorations",
            ));
        };
        located.push((set, binding, chain));
    }
    located.sort_by_key(|&(set, binding, ref chain)| (set, binding, chain.var_index));

    let mut binding_alloc = BindingAllocator::new(
        module
            .resource_bindings()
            .into_iter()
            .map(|(_, set, binding)| (set, binding)),
    );
    let mut planned_types: HashMap<(u16, Vec<u32>), Id> = HashMap::new();
    let mut retyped = 0usize;
    let mut parallel = 0usize;

    for (set, binding, chain) in &located {
        let (set, binding, chain) = (*set, *binding, chain);
        let mixed = var_flags
            .get(&chain.var_id)
            .map_or(false, |&(_, plain)| plain);
        let original = BindingLocation::new(set, binding);

        // Depth-marked clones of the type chain, interned so identical types
        // are never declared twice.
        let mut depth_image_operands = chain.image_operands.clone();
        depth_image_operands[2] = op::IMAGE_DEPTH;
        let depth_image_id = intern_type(
            module,
            &mut planned_types,
            &mut edits,
            alloc,
            Op::TypeImage,
            depth_image_operands,
            chain.image_index,
        )?;
        let pointee_id = match chain.combined {
            Some((combined_index, _)) => intern_type(
                module,
                &mut planned_types,
                &mut edits,
                alloc,
                Op::TypeSampledImage,
                vec![depth_image_id],
                combined_index,
            )?,
            None => depth_image_id,
        };
        // Separate shape: `OpSampledImage` values built from this variable's
        // loads also need a depth-marked result type.
        let depth_simg_id = match chain.combined {
            Some(_) => None,
            None => {
                let image_id = insts[chain.image_index].operands[0];
                let insert_after = module
                    .type_id(Op::TypeSampledImage, &[image_id])
                    .and_then(|id| module.def_index(id))
                    .unwrap_or(chain.ptr_index);
                Some(intern_type(
                    module,
                    &mut planned_types,
                    &mut edits,
                    alloc,
                    Op::TypeSampledImage,
                    vec![depth_image_id],
                    insert_after,
                )?)
            }
        };
        let depth_ptr_id = intern_type(
            module,
            &mut planned_types,
            &mut edits,
            alloc,
            Op::TypePointer,
            vec![op::STORAGE_CLASS_UNIFORM_CONSTANT, pointee_id],
            chain.ptr_index,
        )?;

        if mixed {
            // Both uses cannot share one type shape: give the dref path its
            // own variable at a fresh binding.
            let new_var_id = alloc.next_id()?;
            let new_binding = binding_alloc.allocate_above(set, binding);
            edits.push(Edit::InsertAfter {
                index: chain.var_index,
                insts: vec![Instruction::new(
                    Op::Variable,
                    vec![depth_ptr_id, new_var_id, op::STORAGE_CLASS_UNIFORM_CONSTANT],
                )],
            });
            for &dec_index in module.decoration_indices(chain.var_id) {
                let mut dec = insts[dec_index].clone();
                dec.operands[0] = new_var_id;
                if dec.operands[1] == op::DECORATION_BINDING {
                    if let Some(value) = dec.operands.get_mut(2) {
                        *value = new_binding;
                    }
                }
                edits.push(Edit::InsertAfter {
                    index: dec_index,
                    insts: vec![dec],
                });
            }
            interface_additions(module, chain.var_id, new_var_id, &mut edits);

            let mut dref_loads: Vec<usize> = dref_loads_of_var
                .get(&chain.var_id)
                .map(|loads| loads.iter().copied().collect())
                .unwrap_or_default();
            dref_loads.sort_unstable();
            for load_index in dref_loads {
                edits.push(Edit::SetOperand {
                    index: load_index,
                    operand: 2,
                    value: new_var_id,
                });
                retype_load(module, load_index, pointee_id, depth_simg_id, &mut edits);
            }

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
                    location: BindingLocation::new(set, new_binding),
                    role: BindingRole::DepthComparisonTexture,
                },
            );
            trace!(
                set,
                binding,
                new_binding,
                var_id = chain.var_id,
                "split mixed-use depth texture binding"
            );
            parallel += 1;
        } else {
            // Dref-only: retype the variable in place; the binding number is
            // unchanged but the layout's descriptor type is not, so a
            // correction entry is still recorded.
            edits.push(Edit::SetOperand {
                index: chain.var_index,
                operand: 0,
                value: depth_ptr_id,
            });
            for (load_index, inst) in insts.iter().enumerate() {
                if inst.op == Op::Load && inst.operands[2] == chain.var_id {
                    retype_load(module, load_index, pointee_id, depth_simg_id, &mut edits);
                }
            }

            corrections.record(
                original,
                Correction {
                    location: original,
                    role: BindingRole::DepthComparisonTexture,
                },
            );
            trace!(
                set,
                binding,
                var_id = chain.var_id,
                "retyped depth texture binding in place"
            );
            retyped += 1;
        }

        verify_consumers(module, chain.var_id)?;
    }

    debug!(retyped, parallel, "planned depth-reference texture split");
    Ok(edits)
}

fn mark(flags: &mut (bool, bool), variant: Variant) {
    match variant {
        Variant::Dref => flags.0 = true,
        Variant::Plain => flags.1 = true,
    }
}

struct SampleTrace {
    var_id: Id,
    load_index: usize,
    sampled_image_index: Option<usize>,
}

/// Walks a sample operation's sampled-image operand back to the declaring
/// variable, through either shape:
///
/// - separate: `OpSampledImage(OpLoad(image var), sampler)`
/// - combined: `OpLoad(combined var)`
fn trace_sample(module: &Module, sampled_image: Id) -> Option<SampleTrace> {
    let def_index = module.def_index(sampled_image)?;
    let def = &module.instructions()[def_index];
    let (load_index, sampled_image_index) = match def.op {
        Op::SampledImage => {
            let image_index = module.def_index(def.operands[2])?;
            (image_index, Some(def_index))
        }
        Op::Load => (def_index, None),
        _ => return None,
    };

    let load = &module.instructions()[load_index];
    if load.op != Op::Load {
        return None;
    }
    let var = module.def(load.operands[2])?;
    if var.op != Op::Variable {
        return None;
    }
    Some(SampleTrace {
        var_id: load.operands[2],
        load_index,
        sampled_image_index,
    })
}

fn resolve_chain(module: &Module, var_id: Id) -> Result<VarChain, TransformError> {
    let var_index = module.def_index(var_id).expect("traced variable is defined");
    let var = &module.instructions()[var_index];
    if var.operands[2] != op::STORAGE_CLASS_UNIFORM_CONSTANT {
        return Err(TransformError::unsupported(
            var_index,
            "depth-sampled variable outside UniformConstant storage",
        ));
    }

    let ptr_index = module
        .def_index(var.operands[0])
        .ok_or_else(|| TransformError::unsupported(var_index, "variable type is not declared"))?;
    let ptr = &module.instructions()[ptr_index];
    if ptr.op != Op::TypePointer {
        return Err(TransformError::unsupported(
            var_index,
            "variable type is not a pointer",
        ));
    }

    let pointee_index = module.def_index(ptr.operands[2]).ok_or_else(|| {
        TransformError::unsupported(ptr_index, "pointer pointee type is not declared")
    })?;
    let pointee = &module.instructions()[pointee_index];
    let (combined, image_index) = match pointee.op {
        Op::TypeImage => (None, pointee_index),
        Op::TypeSampledImage => {
            let image_index = module.def_index(pointee.operands[1]).ok_or_else(|| {
                TransformError::unsupported(pointee_index, "sampled image's image type is not declared")
            })?;
            (Some((pointee_index, pointee.operands[0])), image_index)
        }
        _ => {
            return Err(TransformError::unsupported(
                ptr_index,
                "depth-sampled variable is not an image or sampled-image binding",
            ))
        }
    };

    let image = &module.instructions()[image_index];
    if image.op != Op::TypeImage {
        return Err(TransformError::unsupported(
            image_index,
            "sampled image does not wrap an image type",
        ));
    }
    Ok(VarChain {
        var_index,
        var_id,
        ptr_index,
        combined,
        image_index,
        // operands after the result id: sampled type, dim, depth, ...
        image_operands: image.operands[1..].to_vec(),
        depth: image.operands[3],
    })
}

/// Retypes one load of a depth-split variable and every `OpSampledImage`
/// constructed from it (`depth_simg_id` is `Some` for the separate shape).
fn retype_load(
    module: &Module,
    load_index: usize,
    pointee_id: Id,
    depth_simg_id: Option<Id>,
    edits: &mut Vec<Edit>,
) {
    edits.push(Edit::SetOperand {
        index: load_index,
        operand: 0,
        value: pointee_id,
    });
    let Some(depth_simg_id) = depth_simg_id else {
        return;
    };
    let load_result = module.instructions()[load_index].operands[1];
    for (index, inst) in module.instructions().iter().enumerate() {
        if inst.op == Op::SampledImage && inst.operands[2] == load_result {
            edits.push(Edit::SetOperand {
                index,
                operand: 0,
                value: depth_simg_id,
            });
        }
    }
}

/// Appends the parallel depth variable to the interface list of every entry
/// point referencing the original (required since SPIR-V 1.4).
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

/// Rejects consumptions of a depth-split variable this pass cannot rewrite.
fn verify_consumers(module: &Module, var_id: Id) -> Result<(), TransformError> {
    for (index, inst) in module.instructions().iter().enumerate() {
        let bad = match inst.op {
            Op::Store => inst.operands[0] == var_id || inst.operands[1] == var_id,
            Op::AccessChain => inst.operands[2] == var_id,
            // Retyping a variable passed to a helper function would break the
            // callee's signature; not supported.
            Op::FunctionCall => inst.operands[3..].contains(&var_id),
            Op::Variable => inst.operands.get(3) == Some(&var_id),
            // An opcode the engine has no schema for could consume the
            // variable in a position no rewrite covers.
            Op::Unknown(raw) if !op::is_metadata_opcode(raw) => inst.operands.contains(&var_id),
            _ => false,
        };
        if bad {
            return Err(TransformError::unsupported(
                index,
                "depth-sampled variable consumed outside load/decoration positions",
            ));
        }
    }
    Ok(())
}
