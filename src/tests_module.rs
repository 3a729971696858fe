use pretty_assertions::assert_eq;

use crate::module::Module;
use crate::op::{self, Op};
use crate::test_utils::ModuleBuilder;
use crate::{bytes_from_words, words_from_bytes, TransformError};

fn malformed_at(err: TransformError) -> usize {
    match err {
        TransformError::MalformedModule { word_index, .. } => word_index,
        other => panic!("expected MalformedModule, got {other:?}"),
    }
}

#[test]
fn rejects_truncated_header() {
    let err = Module::decode(&[op::SPIRV_MAGIC, 0x0001_0000, 0]).unwrap_err();
    assert_eq!(malformed_at(err), 0);
}

#[test]
fn rejects_bad_magic() {
    let err = Module::decode(&[0xdead_beef, 0x0001_0000, 0, 1, 0]).unwrap_err();
    match err {
        TransformError::MalformedModule { word_index, message } => {
            assert_eq!(word_index, 0);
            assert!(message.contains("bad magic"), "{message}");
        }
        other => panic!("expected MalformedModule, got {other:?}"),
    }
}

#[test]
fn rejects_big_endian_modules() {
    let err =
        Module::decode(&[op::SPIRV_MAGIC.swap_bytes(), 0x0001_0000, 0, 1, 0]).unwrap_err();
    match err {
        TransformError::MalformedModule { message, .. } => {
            assert!(message.contains("big-endian"), "{message}");
        }
        other => panic!("expected MalformedModule, got {other:?}"),
    }
}

#[test]
fn rejects_zero_id_bound() {
    let err = Module::decode(&[op::SPIRV_MAGIC, 0x0001_0000, 0, 0, 0]).unwrap_err();
    assert_eq!(malformed_at(err), 3);
}

#[test]
fn rejects_zero_word_count_instruction() {
    let mut words = ModuleBuilder::new().build();
    words.push(0); // word count 0, opcode 0
    let err = Module::decode(&words).unwrap_err();
    assert_eq!(malformed_at(err), op::HEADER_WORDS);
}

#[test]
fn rejects_instruction_past_end_of_buffer() {
    let mut words = ModuleBuilder::new().build();
    // Claims three words but provides one.
    words.push((3 << 16) | u32::from(Op::TypeVoid.raw()));
    let err = Module::decode(&words).unwrap_err();
    assert_eq!(malformed_at(err), op::HEADER_WORDS);
}

#[test]
fn rejects_operand_count_outside_schema() {
    let mut b = ModuleBuilder::new();
    let id = b.id();
    // OpTypeVoid takes exactly one operand.
    b.inst(Op::TypeVoid.raw(), &[id, 7]);
    let err = Module::decode(&b.build()).unwrap_err();
    assert_eq!(malformed_at(err), op::HEADER_WORDS);
}

#[test]
fn rejects_result_id_not_below_bound() {
    let mut b = ModuleBuilder::new().with_bound(1);
    b.inst(Op::TypeVoid.raw(), &[1]);
    let err = Module::decode(&b.build()).unwrap_err();
    assert_eq!(malformed_at(err), op::HEADER_WORDS);
}

#[test]
fn decode_encode_roundtrips_unknown_opcodes() {
    let mut b = ModuleBuilder::new();
    b.inst(17, &[1]); // OpCapability, structurally opaque here
    let f32_id = b.id();
    b.inst(Op::TypeFloat.raw(), &[f32_id, 32]);
    let sampler_id = b.id();
    b.inst(Op::TypeSampler.raw(), &[sampler_id]);
    let words = b.build();

    let module = Module::decode(&words).unwrap();
    assert_eq!(module.instructions()[0].op, Op::Unknown(17));
    assert_eq!(module.encode().unwrap(), words);
}

#[test]
fn type_dedup_table_finds_structural_shapes() {
    let mut b = ModuleBuilder::new();
    let f32_id = b.id();
    b.inst(Op::TypeFloat.raw(), &[f32_id, 32]);
    let ptr_id = b.id();
    b.inst(
        Op::TypePointer.raw(),
        &[ptr_id, op::STORAGE_CLASS_UNIFORM_CONSTANT, f32_id],
    );
    let module = Module::decode(&b.build()).unwrap();

    assert_eq!(module.type_id(Op::TypeFloat, &[32]), Some(f32_id));
    assert_eq!(
        module.type_id(
            Op::TypePointer,
            &[op::STORAGE_CLASS_UNIFORM_CONSTANT, f32_id]
        ),
        Some(ptr_id)
    );
    assert_eq!(module.type_id(Op::TypeFloat, &[16]), None);
}

#[test]
fn binding_location_reads_both_decorations() {
    let mut b = ModuleBuilder::new();
    let var_id = b.id();
    b.inst(
        Op::Decorate.raw(),
        &[var_id, op::DECORATION_DESCRIPTOR_SET, 1],
    );
    b.inst(Op::Decorate.raw(), &[var_id, op::DECORATION_BINDING, 7]);
    let f32_id = b.id();
    b.inst(Op::TypeFloat.raw(), &[f32_id, 32]);
    let ptr_id = b.id();
    b.inst(
        Op::TypePointer.raw(),
        &[ptr_id, op::STORAGE_CLASS_UNIFORM_CONSTANT, f32_id],
    );
    b.inst(
        Op::Variable.raw(),
        &[ptr_id, var_id, op::STORAGE_CLASS_UNIFORM_CONSTANT],
    );
    let module = Module::decode(&b.build()).unwrap();

    assert_eq!(module.binding_location(var_id), Some((1, 7)));
    assert_eq!(module.binding_location(f32_id), None);
}

#[test]
fn tolerates_decorations_without_literal_values() {
    // OpDecorate's schema allows literal-free decorations, so a Binding or
    // DescriptorSet decoration may arrive without its value; the accessors
    // must treat it as absent instead of reading past the operand list.
    let mut b = ModuleBuilder::new();
    let var_id = b.id();
    b.inst(
        Op::Decorate.raw(),
        &[var_id, op::DECORATION_DESCRIPTOR_SET],
    );
    b.inst(Op::Decorate.raw(), &[var_id, op::DECORATION_BINDING, 5]);
    let module = Module::decode(&b.build()).unwrap();

    assert_eq!(module.decoration(var_id, op::DECORATION_DESCRIPTOR_SET), None);
    assert_eq!(module.decoration(var_id, op::DECORATION_BINDING), Some(5));
    assert_eq!(module.binding_location(var_id), None);
    assert_eq!(module.resource_bindings(), vec![]);
}

#[test]
fn entry_point_interface_starts_after_name_literal() {
    let mut b = ModuleBuilder::new();
    let main_id = b.id();
    let iface_id = b.id();
    let mut operands = vec![4, main_id]; // Fragment
    operands.extend(ModuleBuilder::string_operands("main"));
    operands.push(iface_id);
    b.inst(Op::EntryPoint.raw(), &operands);
    let module = Module::decode(&b.build()).unwrap();

    let inst = &module.instructions()[0];
    // "main" packs to two words (terminator needs its own word).
    let start = Module::entry_point_interface_start(inst).unwrap();
    assert_eq!(start, 4);
    assert_eq!(&inst.operands[start..], &[iface_id]);
}

#[test]
fn byte_conversions_roundtrip_and_validate_length() {
    let words = ModuleBuilder::new().build();
    let bytes = bytes_from_words(&words);
    assert_eq!(words_from_bytes(&bytes).unwrap(), words);

    let err = words_from_bytes(&bytes[..bytes.len() - 2]).unwrap_err();
    assert!(matches!(err, TransformError::MalformedModule { .. }));
}
