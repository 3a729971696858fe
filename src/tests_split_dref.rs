use pretty_assertions::assert_eq;

use crate::module::Module;
use crate::op::{self, Op};
use crate::split_dref::split_depth_reference_textures;
use crate::test_utils::ModuleBuilder;
use crate::{BindingLocation, BindingRole, Correction, TransformError};

struct SeparateFixture {
    words: Vec<u32>,
    var_img: u32,
    var_smp: u32,
    ptr_img: u32,
    img_id: u32,
    simg_id: u32,
    f32_id: u32,
    ld_img: u32,
    simg_value: u32,
}

/// A separate image (0, 1) + sampler (0, 2) pair whose combined value feeds
/// one depth-comparison sample.
fn separate_fixture(depth: u32) -> SeparateFixture {
    let mut b = ModuleBuilder::new();
    let var_img = b.id();
    let var_smp = b.id();
    b.inst(Op::Decorate.raw(), &[var_img, op::DECORATION_DESCRIPTOR_SET, 0]);
    b.inst(Op::Decorate.raw(), &[var_img, op::DECORATION_BINDING, 1]);
    b.inst(Op::Decorate.raw(), &[var_smp, op::DECORATION_DESCRIPTOR_SET, 0]);
    b.inst(Op::Decorate.raw(), &[var_smp, op::DECORATION_BINDING, 2]);
    let f32_id = b.id();
    b.inst(Op::TypeFloat.raw(), &[f32_id, 32]);
    let img_id = b.id();
    b.inst(Op::TypeImage.raw(), &[img_id, f32_id, 1, depth, 0, 0, 1, 0]);
    let simg_id = b.id();
    b.inst(Op::TypeSampledImage.raw(), &[simg_id, img_id]);
    let smp_ty = b.id();
    b.inst(Op::TypeSampler.raw(), &[smp_ty]);
    let ptr_img = b.id();
    b.inst(
        Op::TypePointer.raw(),
        &[ptr_img, op::STORAGE_CLASS_UNIFORM_CONSTANT, img_id],
    );
    let ptr_smp = b.id();
    b.inst(
        Op::TypePointer.raw(),
        &[ptr_smp, op::STORAGE_CLASS_UNIFORM_CONSTANT, smp_ty],
    );
    b.inst(
        Op::Variable.raw(),
        &[ptr_img, var_img, op::STORAGE_CLASS_UNIFORM_CONSTANT],
    );
    b.inst(
        Op::Variable.raw(),
        &[ptr_smp, var_smp, op::STORAGE_CLASS_UNIFORM_CONSTANT],
    );
    let ld_img = b.id();
    b.inst(Op::Load.raw(), &[img_id, ld_img, var_img]);
    let ld_smp = b.id();
    b.inst(Op::Load.raw(), &[smp_ty, ld_smp, var_smp]);
    let simg_value = b.id();
    b.inst(
        Op::SampledImage.raw(),
        &[simg_id, simg_value, ld_img, ld_smp],
    );
    let coord = b.id();
    let dref = b.id();
    let res = b.id();
    b.inst(
        Op::ImageSampleDrefImplicitLod.raw(),
        &[f32_id, res, simg_value, coord, dref],
    );
    SeparateFixture {
        words: b.build(),
        var_img,
        var_smp,
        ptr_img,
        img_id,
        simg_id,
        f32_id,
        ld_img,
        simg_value,
    }
}

fn count_variables(module: &Module) -> usize {
    module
        .instructions()
        .iter()
        .filter(|inst| inst.op == Op::Variable)
        .count()
}

#[test]
fn depth_marked_texture_passes_through() {
    let fixture = separate_fixture(op::IMAGE_DEPTH);
    let out = split_depth_reference_textures(&fixture.words).unwrap();
    assert_eq!(out.words, fixture.words);
    assert!(out.corrections.is_empty());
}

#[test]
fn plain_only_module_passes_through() {
    let mut b = ModuleBuilder::new();
    let var_id = b.id();
    b.inst(Op::Decorate.raw(), &[var_id, op::DECORATION_DESCRIPTOR_SET, 0]);
    b.inst(Op::Decorate.raw(), &[var_id, op::DECORATION_BINDING, 0]);
    let f32_id = b.id();
    b.inst(Op::TypeFloat.raw(), &[f32_id, 32]);
    let img_id = b.id();
    b.inst(Op::TypeImage.raw(), &[img_id, f32_id, 1, 0, 0, 0, 1, 0]);
    let simg_id = b.id();
    b.inst(Op::TypeSampledImage.raw(), &[simg_id, img_id]);
    let ptr_id = b.id();
    b.inst(
        Op::TypePointer.raw(),
        &[ptr_id, op::STORAGE_CLASS_UNIFORM_CONSTANT, simg_id],
    );
    b.inst(
        Op::Variable.raw(),
        &[ptr_id, var_id, op::STORAGE_CLASS_UNIFORM_CONSTANT],
    );
    let ld = b.id();
    b.inst(Op::Load.raw(), &[simg_id, ld, var_id]);
    let coord = b.id();
    let res = b.id();
    b.inst(
        Op::ImageSampleImplicitLod.raw(),
        &[f32_id, res, ld, coord],
    );
    let words = b.build();

    let out = split_depth_reference_textures(&words).unwrap();
    assert_eq!(out.words, words);
    assert!(out.corrections.is_empty());
}

#[test]
fn retypes_dref_only_separate_texture_in_place() {
    let fixture = separate_fixture(0);
    let out = split_depth_reference_textures(&fixture.words).unwrap();

    assert_eq!(out.corrections.len(), 1);
    assert_eq!(
        out.corrections.lookup(BindingLocation::new(0, 1)),
        &[Correction {
            location: BindingLocation::new(0, 1),
            role: BindingRole::DepthComparisonTexture,
        }]
    );
    assert!(out.corrections.lookup(BindingLocation::new(0, 2)).is_empty());

    let module = Module::decode(&out.words).unwrap();
    assert_eq!(count_variables(&module), 2);
    assert_eq!(module.binding_location(fixture.var_smp), Some((0, 2)));

    // The variable keeps its id and binding but now carries a depth-marked
    // type chain.
    let var = module.def(fixture.var_img).unwrap();
    let new_ptr_id = var.operands[0];
    assert_ne!(new_ptr_id, fixture.ptr_img);
    let depth_img_id = module.def(new_ptr_id).unwrap().operands[2];
    let depth_img = module.def(depth_img_id).unwrap();
    assert_eq!(depth_img.op, Op::TypeImage);
    assert_eq!(
        depth_img.operands[1..],
        [fixture.f32_id, 1, op::IMAGE_DEPTH, 0, 0, 1, 0]
    );

    // The load and the sampled-image value follow the retype.
    let load = module.def(fixture.ld_img).unwrap();
    assert_eq!(load.operands[0], depth_img_id);
    let simg_value = module.def(fixture.simg_value).unwrap();
    let depth_simg = module.def(simg_value.operands[0]).unwrap();
    assert_eq!(depth_simg.op, Op::TypeSampledImage);
    assert_eq!(depth_simg.operands[1], depth_img_id);
    assert_ne!(simg_value.operands[0], fixture.simg_id);
}

#[test]
fn retypes_dref_only_combined_texture_in_place() {
    let mut b = ModuleBuilder::new();
    let var_id = b.id();
    b.inst(Op::Decorate.raw(), &[var_id, op::DECORATION_DESCRIPTOR_SET, 0]);
    b.inst(Op::Decorate.raw(), &[var_id, op::DECORATION_BINDING, 0]);
    let f32_id = b.id();
    b.inst(Op::TypeFloat.raw(), &[f32_id, 32]);
    let img_id = b.id();
    b.inst(Op::TypeImage.raw(), &[img_id, f32_id, 1, 0, 0, 0, 1, 0]);
    let simg_id = b.id();
    b.inst(Op::TypeSampledImage.raw(), &[simg_id, img_id]);
    let ptr_id = b.id();
    b.inst(
        Op::TypePointer.raw(),
        &[ptr_id, op::STORAGE_CLASS_UNIFORM_CONSTANT, simg_id],
    );
    b.inst(
        Op::Variable.raw(),
        &[ptr_id, var_id, op::STORAGE_CLASS_UNIFORM_CONSTANT],
    );
    let ld = b.id();
    b.inst(Op::Load.raw(), &[simg_id, ld, var_id]);
    let coord = b.id();
    let dref = b.id();
    let res = b.id();
    b.inst(
        Op::ImageSampleDrefImplicitLod.raw(),
        &[f32_id, res, ld, coord, dref],
    );

    let out = split_depth_reference_textures(&b.build()).unwrap();
    assert_eq!(
        out.corrections.lookup(BindingLocation::new(0, 0)),
        &[Correction {
            location: BindingLocation::new(0, 0),
            role: BindingRole::DepthComparisonTexture,
        }]
    );

    let module = Module::decode(&out.words).unwrap();
    let var = module.def(var_id).unwrap();
    let pointee = module.def(module.def(var.operands[0]).unwrap().operands[2]).unwrap();
    assert_eq!(pointee.op, Op::TypeSampledImage);
    let depth_img = module.def(pointee.operands[1]).unwrap();
    assert_eq!(depth_img.operands[3], op::IMAGE_DEPTH);
    // The load result type follows the variable.
    assert_eq!(module.def(ld).unwrap().operands[0], pointee.operands[0]);
}

#[test]
fn mixed_use_texture_gets_parallel_depth_variable() {
    // Image at (0, 0), sampler at (0, 1); one load feeds an ordinary sample,
    // a second load feeds a depth-comparison sample.
    let mut b = ModuleBuilder::new();
    let var_img = b.id();
    let var_smp = b.id();
    b.inst(Op::Decorate.raw(), &[var_img, op::DECORATION_DESCRIPTOR_SET, 0]);
    b.inst(Op::Decorate.raw(), &[var_img, op::DECORATION_BINDING, 0]);
    b.inst(Op::Decorate.raw(), &[var_smp, op::DECORATION_DESCRIPTOR_SET, 0]);
    b.inst(Op::Decorate.raw(), &[var_smp, op::DECORATION_BINDING, 1]);
    let f32_id = b.id();
    b.inst(Op::TypeFloat.raw(), &[f32_id, 32]);
    let img_id = b.id();
    b.inst(Op::TypeImage.raw(), &[img_id, f32_id, 1, 0, 0, 0, 1, 0]);
    let simg_id = b.id();
    b.inst(Op::TypeSampledImage.raw(), &[simg_id, img_id]);
    let smp_ty = b.id();
    b.inst(Op::TypeSampler.raw(), &[smp_ty]);
    let ptr_img = b.id();
    b.inst(
        Op::TypePointer.raw(),
        &[ptr_img, op::STORAGE_CLASS_UNIFORM_CONSTANT, img_id],
    );
    let ptr_smp = b.id();
    b.inst(
        Op::TypePointer.raw(),
        &[ptr_smp, op::STORAGE_CLASS_UNIFORM_CONSTANT, smp_ty],
    );
    b.inst(
        Op::Variable.raw(),
        &[ptr_img, var_img, op::STORAGE_CLASS_UNIFORM_CONSTANT],
    );
    b.inst(
        Op::Variable.raw(),
        &[ptr_smp, var_smp, op::STORAGE_CLASS_UNIFORM_CONSTANT],
    );
    let ld_smp = b.id();
    b.inst(Op::Load.raw(), &[smp_ty, ld_smp, var_smp]);

    let ld1 = b.id();
    b.inst(Op::Load.raw(), &[img_id, ld1, var_img]);
    let si1 = b.id();
    b.inst(Op::SampledImage.raw(), &[simg_id, si1, ld1, ld_smp]);
    let coord = b.id();
    let res1 = b.id();
    b.inst(
        Op::ImageSampleImplicitLod.raw(),
        &[f32_id, res1, si1, coord],
    );

    let ld2 = b.id();
    b.inst(Op::Load.raw(), &[img_id, ld2, var_img]);
    let si2 = b.id();
    b.inst(Op::SampledImage.raw(), &[simg_id, si2, ld2, ld_smp]);
    let dref = b.id();
    let res2 = b.id();
    b.inst(
        Op::ImageSampleDrefImplicitLod.raw(),
        &[f32_id, res2, si2, coord, dref],
    );

    let out = split_depth_reference_textures(&b.build()).unwrap();
    assert_eq!(
        out.corrections.lookup(BindingLocation::new(0, 0)),
        &[
            Correction {
                location: BindingLocation::new(0, 0),
                role: BindingRole::Texture,
            },
            Correction {
                location: BindingLocation::new(0, 2),
                role: BindingRole::DepthComparisonTexture,
            },
        ]
    );

    let module = Module::decode(&out.words).unwrap();
    assert_eq!(count_variables(&module), 3);

    // The ordinary path is untouched.
    assert_eq!(module.def(ld1).unwrap().operands, vec![img_id, ld1, var_img]);
    assert_eq!(module.def(si1).unwrap().operands[0], simg_id);

    // The dref path moved to the parallel depth-typed variable at (0, 2).
    let dref_load = module.def(ld2).unwrap();
    let new_var_id = dref_load.operands[2];
    assert_ne!(new_var_id, var_img);
    assert_eq!(module.binding_location(new_var_id), Some((0, 2)));
    let depth_img_id = dref_load.operands[0];
    assert_eq!(module.def(depth_img_id).unwrap().operands[3], op::IMAGE_DEPTH);
    let new_var = module.def(new_var_id).unwrap();
    assert_eq!(
        module.def(new_var.operands[0]).unwrap().operands[2],
        depth_img_id
    );
    assert_eq!(
        module.def(si2).unwrap().operands[0],
        module
            .type_id(Op::TypeSampledImage, &[depth_img_id])
            .unwrap()
    );
}

#[test]
fn rejects_value_feeding_both_sample_kinds() {
    let fixture = separate_fixture(0);
    // Reuse the combined value for an ordinary sample too.
    let mut extra = ModuleBuilder::new();
    extra.inst(
        Op::ImageSampleImplicitLod.raw(),
        &[fixture.f32_id, fixture.words[3], fixture.simg_value, 1],
    );
    let mut words = fixture.words.clone();
    let res_id = words[3]; // current bound becomes the extra result id
    words[3] = res_id + 1;
    words.extend_from_slice(&extra.build()[op::HEADER_WORDS..]);

    let err = split_depth_reference_textures(&words).unwrap_err();
    assert!(matches!(err, TransformError::UnsupportedConstruct { .. }));
}

#[test]
fn rejects_untraceable_dref_sample() {
    let mut b = ModuleBuilder::new();
    let f32_id = b.id();
    b.inst(Op::TypeFloat.raw(), &[f32_id, 32]);
    let phantom = b.id(); // never defined
    let coord = b.id();
    let dref = b.id();
    let res = b.id();
    b.inst(
        Op::ImageSampleDrefImplicitLod.raw(),
        &[f32_id, res, phantom, coord, dref],
    );

    let err = split_depth_reference_textures(&b.build()).unwrap_err();
    assert!(matches!(err, TransformError::UnsupportedConstruct { .. }));
}

#[test]
fn rejects_depth_variable_consumed_by_unknown_opcode() {
    // OpCopyObject is outside the engine's schema table; the depth variable
    // flowing into it would escape the retype.
    let fixture = separate_fixture(0);
    let mut words = fixture.words.clone();
    let copy_id = words[3];
    let mut extra = ModuleBuilder::new();
    extra.inst(63, &[fixture.ptr_img, copy_id, fixture.var_img]);
    words.extend_from_slice(&extra.build()[op::HEADER_WORDS..]);
    words[3] += 1;

    let err = split_depth_reference_textures(&words).unwrap_err();
    assert!(matches!(err, TransformError::UnsupportedConstruct { .. }));
}

#[test]
fn rejects_depth_variable_passed_to_helper_function() {
    let fixture = separate_fixture(0);
    let mut extra = ModuleBuilder::new();
    let bound = fixture.words[3];
    let (helper_id, call_id) = (bound, bound + 1);
    extra.inst(
        Op::FunctionCall.raw(),
        &[fixture.f32_id, call_id, helper_id, fixture.var_img],
    );
    let mut words = fixture.words.clone();
    words[3] = bound + 2;
    words.extend_from_slice(&extra.build()[op::HEADER_WORDS..]);

    let err = split_depth_reference_textures(&words).unwrap_err();
    assert!(matches!(err, TransformError::UnsupportedConstruct { .. }));
}
