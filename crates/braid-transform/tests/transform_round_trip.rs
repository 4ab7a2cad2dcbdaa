// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Full descriptor round-trips: identity sharing, decode-time collaborator
//! injection, and laziness preservation.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use braid_codec::{
    decode_from_bytes_as, Codec, CodecError, CodecRegistry, CodecRegistryBuilder, IdentityToken,
    LazyCell, ReadContext, ServiceRegistry, SharedValue, WriteContext,
};
use braid_transform::{
    names, register_transform_codecs, AbsolutePathNormalization, AttributeContainer,
    DirectorySensitivity, FileLookup, InstantiationScheme, NameOnlyNormalization, ParameterSpec,
    PathNormalization, TransformEnvironment, TransformSpec,
};

/// Marker for the transform action implementation under test.
struct MinifyAction;

const MINIFY_NAME: &str = "demo.MinifyAction";

/// Two pipeline stages that may reference the same descriptor.
struct Job {
    pre: Arc<TransformSpec>,
    post: Arc<TransformSpec>,
}

struct JobCodec;

impl Codec for JobCodec {
    type Value = Job;

    fn encode(&self, ctx: &mut WriteContext<'_>, value: &Arc<Job>) -> Result<(), CodecError> {
        ctx.encode_shared(IdentityToken::of(value), |ctx| {
            let pre: SharedValue = value.pre.clone();
            ctx.with_field("pre", |ctx| ctx.write_value(&pre))?;
            let post: SharedValue = value.post.clone();
            ctx.with_field("post", |ctx| ctx.write_value(&post))
        })
    }

    fn decode(&self, ctx: &mut ReadContext<'_>) -> Result<Arc<Job>, CodecError> {
        ctx.decode_shared(|ctx| {
            let pre = ctx.with_field("pre", |ctx| ctx.read_value_of::<TransformSpec>())?;
            let post = ctx.with_field("post", |ctx| ctx.read_value_of::<TransformSpec>())?;
            Ok(Arc::new(Job { pre, post }))
        })
    }
}

struct Host {
    registry: CodecRegistry,
    file_lookup: Arc<FileLookup>,
    instantiation: Arc<InstantiationScheme>,
}

fn host(base: &str) -> Host {
    let file_lookup = Arc::new(FileLookup::new(base));
    let instantiation = Arc::new(InstantiationScheme::new("direct"));
    let registry = register_transform_codecs(
        CodecRegistryBuilder::new(),
        file_lookup.clone(),
        instantiation.clone(),
    )
    .register_type::<MinifyAction>(MINIFY_NAME)
    .register("demo.Job", JobCodec)
    .build();
    Host {
        registry,
        file_lookup,
        instantiation,
    }
}

fn demo_spec(host: &Host, services: &Arc<ServiceRegistry>) -> Arc<TransformSpec> {
    let registry = &host.registry;
    let implementation = registry.descriptor(MINIFY_NAME).unwrap();
    let input = registry.descriptor(names::ABSOLUTE_PATH).unwrap();
    let dependencies = registry.descriptor(names::NAME_ONLY).unwrap();
    Arc::new(TransformSpec::new(
        implementation,
        Arc::new(AttributeContainer::from_entries([("artifactType", "js")])),
        PathNormalization {
            input,
            dependencies,
        },
        true,
        DirectorySensitivity::IgnoreDirectories,
        Arc::new(LazyCell::new(Arc::new(ParameterSpec::from_inputs([(
            "config",
            "cfg/minify.toml",
        )])))),
        TransformEnvironment {
            file_lookup: host.file_lookup.clone(),
            instantiation: host.instantiation.clone(),
            services: services.clone(),
        },
    ))
}

fn count_occurrences(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .filter(|window| *window == needle)
        .count()
}

// ── 1. shared descriptor serializes once, decodes to one instance ───────

#[test]
fn shared_descriptor_round_trips_once() {
    let writer = host("/writer");
    let services = Arc::new(ServiceRegistry::new());
    let spec = demo_spec(&writer, &services);
    let job: SharedValue = Arc::new(Job {
        pre: spec.clone(),
        post: spec,
    });

    let mut ctx = WriteContext::new(&writer.registry);
    ctx.write_value(&job).unwrap();
    // job + descriptor + attribute container + lazy-cell is value-encoded:
    // three identities in total
    assert_eq!(ctx.identity_count(), 3);
    let bytes = ctx.finish();

    // the descriptor payload (recognizable by its implementation type name)
    // appears exactly once in the stream
    assert_eq!(count_occurrences(&bytes, MINIFY_NAME.as_bytes()), 1);

    let decoded = decode_from_bytes_as::<Job>(&writer.registry, services, &bytes).unwrap();
    assert!(Arc::ptr_eq(&decoded.pre, &decoded.post));
    assert!(Arc::ptr_eq(
        decoded.pre.from_attributes(),
        decoded.post.from_attributes()
    ));
}

// ── 2. every field survives the round-trip ──────────────────────────────

#[test]
fn descriptor_fields_round_trip() {
    let writer = host("/writer");
    let services = Arc::new(ServiceRegistry::new());
    let spec: SharedValue = demo_spec(&writer, &services);

    let mut ctx = WriteContext::new(&writer.registry);
    ctx.write_value(&spec).unwrap();
    let bytes = ctx.finish();

    let decoded =
        decode_from_bytes_as::<TransformSpec>(&writer.registry, services, &bytes).unwrap();
    assert_eq!(decoded.implementation().name(), MINIFY_NAME);
    assert!(decoded.normalization().input.is::<AbsolutePathNormalization>());
    assert!(decoded.normalization().dependencies.is::<NameOnlyNormalization>());
    assert!(decoded.is_cacheable());
    assert_eq!(
        decoded.directory_sensitivity(),
        DirectorySensitivity::IgnoreDirectories
    );
    assert_eq!(decoded.from_attributes().get("artifactType"), Some("js"));
    assert_eq!(
        decoded.parameters().description().input("config"),
        Some("cfg/minify.toml")
    );
}

// ── 3. collaborators come from the decoding session, not the stream ─────

struct WorkerPool {
    size: usize,
}

#[test]
fn collaborators_injected_at_decode() {
    let writer = host("/writer");
    let write_services = Arc::new(ServiceRegistry::new());
    let spec: SharedValue = demo_spec(&writer, &write_services);

    let mut ctx = WriteContext::new(&writer.registry);
    ctx.write_value(&spec).unwrap();
    let bytes = ctx.finish();

    // a different host decodes the stream with its own services
    let reader = host("/reader");
    let pool = Arc::new(WorkerPool { size: 4 });
    let read_services = Arc::new(ServiceRegistry::new().provide(pool.clone()));

    let decoded =
        decode_from_bytes_as::<TransformSpec>(&reader.registry, read_services, &bytes).unwrap();
    let environment = decoded.environment();
    assert!(Arc::ptr_eq(&environment.file_lookup, &reader.file_lookup));
    assert!(Arc::ptr_eq(&environment.instantiation, &reader.instantiation));
    let found = environment.services.lookup::<WorkerPool>().unwrap();
    assert_eq!(found.size, 4);
    assert!(Arc::ptr_eq(&found, &pool));
}

// ── 4. parameters stay lazy and isolate against the reading host ────────

#[test]
fn parameters_stay_lazy_and_isolate_on_reader() {
    let writer = host("/writer");
    let services = Arc::new(ServiceRegistry::new());
    let spec: SharedValue = demo_spec(&writer, &services);

    let mut ctx = WriteContext::new(&writer.registry);
    ctx.write_value(&spec).unwrap();
    let bytes = ctx.finish();

    let reader = host("/reader");
    let decoded =
        decode_from_bytes_as::<TransformSpec>(&reader.registry, services, &bytes).unwrap();
    assert!(!decoded.parameters().is_computed());

    let isolated = decoded.isolated_parameters();
    assert_eq!(isolated.value("config"), Some("/reader/cfg/minify.toml"));
    // second access observes the cached result
    let again = decoded.isolated_parameters();
    assert!(Arc::ptr_eq(&isolated, &again));
}

// ── 5. an already-isolated cell travels with its value ──────────────────

#[test]
fn computed_parameters_travel_with_value() {
    let writer = host("/writer");
    let services = Arc::new(ServiceRegistry::new());
    let spec = demo_spec(&writer, &services);
    let before = spec.isolated_parameters();
    assert_eq!(before.value("config"), Some("/writer/cfg/minify.toml"));

    let erased: SharedValue = spec;
    let mut ctx = WriteContext::new(&writer.registry);
    ctx.write_value(&erased).unwrap();
    let bytes = ctx.finish();

    let reader = host("/reader");
    let decoded =
        decode_from_bytes_as::<TransformSpec>(&reader.registry, services, &bytes).unwrap();
    assert!(decoded.parameters().is_computed());
    let after = decoded.isolated_parameters();
    // the writer-side isolation is preserved verbatim, not recomputed
    assert_eq!(after.value("config"), Some("/writer/cfg/minify.toml"));
    assert_eq!(after.fingerprint(), before.fingerprint());
}

// ── 6. two descriptors sharing one attribute container ──────────────────

#[test]
fn attribute_container_shares_across_descriptors() {
    let writer = host("/writer");
    let services = Arc::new(ServiceRegistry::new());

    let attrs = Arc::new(AttributeContainer::from_entries([("artifactType", "js")]));
    let registry = &writer.registry;
    let make = |attrs: &Arc<AttributeContainer>| -> Arc<TransformSpec> {
        Arc::new(TransformSpec::new(
            registry.descriptor(MINIFY_NAME).unwrap(),
            attrs.clone(),
            PathNormalization {
                input: registry.descriptor(names::ABSOLUTE_PATH).unwrap(),
                dependencies: registry.descriptor(names::NAME_ONLY).unwrap(),
            },
            false,
            DirectorySensitivity::Default,
            Arc::new(LazyCell::new(Arc::new(ParameterSpec::from_inputs::<
                [(&str, &str); 0],
                &str,
                &str,
            >([])))),
            TransformEnvironment {
                file_lookup: writer.file_lookup.clone(),
                instantiation: writer.instantiation.clone(),
                services: services.clone(),
            },
        ))
    };

    let job: SharedValue = Arc::new(Job {
        pre: make(&attrs),
        post: make(&attrs),
    });
    let mut ctx = WriteContext::new(&writer.registry);
    ctx.write_value(&job).unwrap();
    let bytes = ctx.finish();

    let decoded = decode_from_bytes_as::<Job>(&writer.registry, services, &bytes).unwrap();
    // distinct descriptors, one shared attribute container
    assert!(!Arc::ptr_eq(&decoded.pre, &decoded.post));
    assert!(Arc::ptr_eq(
        decoded.pre.from_attributes(),
        decoded.post.from_attributes()
    ));
}
