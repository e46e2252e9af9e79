//! Validates the particle shader with naga and checks that its uniform block
//! agrees with the Rust layout.

use pointfield::gpu::{FieldUniforms, PARTICLE_SHADER};

/// Validates WGSL code using naga.
fn validate_wgsl(code: &str) -> Result<naga::Module, String> {
    let module = naga::front::wgsl::parse_str(code)
        .map_err(|e| format!("WGSL parse error: {}", e.emit_to_string(code)))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator
        .validate(&module)
        .map_err(|e| format!("WGSL validation error: {:?}", e))?;

    Ok(module)
}

#[test]
fn test_particle_shader_validates() {
    if let Err(e) = validate_wgsl(PARTICLE_SHADER) {
        panic!("{e}");
    }
}

#[test]
fn test_entry_points_present() {
    let module = validate_wgsl(PARTICLE_SHADER).unwrap();
    let names: Vec<_> = module.entry_points.iter().map(|ep| ep.name.as_str()).collect();
    assert!(names.contains(&"vs_main"));
    assert!(names.contains(&"fs_main"));
}

#[test]
fn test_uniform_block_size_matches() {
    let module = validate_wgsl(PARTICLE_SHADER).unwrap();
    let (_, ty) = module
        .types
        .iter()
        .find(|(_, ty)| ty.name.as_deref() == Some("Uniforms"))
        .expect("Uniforms struct");
    match &ty.inner {
        naga::TypeInner::Struct { span, members } => {
            assert_eq!(*span as usize, std::mem::size_of::<FieldUniforms>());
            let offsets: Vec<_> = members
                .iter()
                .map(|m| (m.name.as_deref().unwrap_or(""), m.offset))
                .collect();
            assert!(offsets.contains(&("brightness", 80)));
            assert!(offsets.contains(&("texture_size", 88)));
            assert!(offsets.contains(&("color", 96)));
            assert!(offsets.contains(&("scale", 108)));
        }
        other => panic!("Uniforms is not a struct: {other:?}"),
    }
}
