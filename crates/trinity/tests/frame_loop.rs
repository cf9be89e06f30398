//! End-to-end frame loop: object file to draw calls, through purge and reload

use parking_lot::Mutex;
use std::sync::Arc;

use trinity::prelude::*;
use trinity::{GeometryBinding, Mesh, Scene};
use trinity_core::{DeviceCommand, EffectId, HeadlessDevice, ManualClock};
use trinity_resource::MemoryFetcher;

const QUAD: &str = r#"{ "meshes": [ {
    "name": "quad", "stride": 3,
    "vertices": [0,0,0, 1,0,0, 1,1,0, 0,1,0],
    "indices": [0,1,2, 0,2,3, 0,1, 1,2],
    "areas": [ { "name": "front", "start": 0, "count": 3 },
               { "name": "back", "start": 3, "count": 3 },
               { "name": "edges", "start": 6, "count": 4 } ]
} ] }"#;

const BRIDGE: &str = r#"
<scene type="Scene">
    <name>bridge</name>
    <objects list="1">
        <hull type="Mesh">
            <name>hull</name>
            <geometry>quad.geo</geometry>
            <mesh_index>0</mesh_index>
            <opaque_areas list="1">
                <area type="MeshArea">
                    <name>back</name>
                    <effect>res:/fx/hull.fx</effect>
                </area>
                <area type="MeshArea">
                    <index>0</index>
                    <effect>res:/fx/hull.fx</effect>
                </area>
                <area type="MeshArea">
                    <index>2</index>
                    <display>off</display>
                    <effect>res:/fx/hull.fx</effect>
                </area>
            </opaque_areas>
            <transparent_areas list="1">
                <area type="MeshArea">
                    <index>0</index>
                    <count>2</count>
                    <effect>res:/fx/glass.fx</effect>
                </area>
            </transparent_areas>
        </hull>
        <ghost type="Mesh">
            <geometry>quad.geo</geometry>
            <display>false</display>
            <opaque_areas list="1">
                <area type="MeshArea"><effect>res:/fx/hull.fx</effect></area>
            </opaque_areas>
        </ghost>
        <notes type="dict"><author>yard</author></notes>
    </objects>
</scene>
"#;

type Slot = Arc<Mutex<Option<trinity_reader::Result<Value>>>>;

struct Fixture {
    device: Arc<HeadlessDevice>,
    fetcher: Arc<MemoryFetcher>,
    ctx: Context,
}

fn fixture(config: TrinityConfig) -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();
    let device = Arc::new(HeadlessDevice::new());
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.insert("quad.geo", QUAD.as_bytes().to_vec());
    fetcher.insert("scenes/bridge.red", BRIDGE.as_bytes().to_vec());

    let ctx = Context::with_clock(config, device.clone(), fetcher.clone(), Arc::new(ManualClock::new()));
    Fixture { device, fetcher, ctx }
}

fn load(ctx: &Context, path: &str) -> Slot {
    let slot: Slot = Arc::new(Mutex::new(None));
    let target = Arc::clone(&slot);
    ctx.load_object(path, move |result| *target.lock() = Some(result));
    slot
}

fn draws(device: &HeadlessDevice) -> Vec<(EffectId, u32, u32)> {
    device
        .take_commands()
        .into_iter()
        .filter_map(|c| match c {
            DeviceCommand::Draw {
                effect, first, count, ..
            } => Some((effect, first, count)),
            _ => None,
        })
        .collect()
}

fn render(ctx: &Context, scene: &Value, mode: RenderMode) -> RenderStats {
    scene
        .with_object(|s: &Scene| ctx.render(s, mode, "Main"))
        .unwrap_or_default()
}

fn hull_binding(scene: &Value) -> Arc<GeometryBinding> {
    let objects = scene.with_object(|s: &Scene| s.objects()).unwrap();
    objects[0].with_object(|m: &Mesh| m.binding().cloned()).flatten().unwrap()
}

#[test]
fn test_scene_file_to_draws_through_purge_and_reload() {
    let config = TrinityConfig {
        registry: RegistryConfig::default().with_purge(2, 1),
        ..Default::default()
    };
    let mut f = fixture(config);
    let hull_fx = EffectId::from_path("res:/fx/hull.fx");
    let glass_fx = EffectId::from_path("res:/fx/glass.fx");

    let slot = load(&f.ctx, "scenes/bridge.red");
    assert_eq!(f.ctx.loader().pending(), 1);

    // Object file prepared and constructed; meshes request their geometry
    let report = f.ctx.frame();
    assert_eq!(report.objects_constructed, 1);
    assert_eq!(report.pending_objects, 0);
    let scene = slot.lock().take().unwrap().unwrap();
    assert_eq!(scene.with_object(|s: &Scene| s.len()), Some(3));

    // Meshes from the file are displayed unless they say otherwise
    let objects = scene.with_object(|s: &Scene| s.objects()).unwrap();
    assert_eq!(objects[0].with_object(|m: &Mesh| m.display), Some(true));
    assert_eq!(objects[1].with_object(|m: &Mesh| m.display), Some(false));

    let binding = hull_binding(&scene);
    assert!(!binding.is_valid());
    assert_eq!(render(&f.ctx, &scene, RenderMode::Opaque).batches, 0);

    // Geometry prepared; the binding hears about it
    f.ctx.frame();
    assert!(binding.is_valid());
    assert_eq!(binding.rebuild_count(), 1);
    assert_eq!(binding.resolve("back"), Some(1));
    f.device.take_commands();

    let stats = render(&f.ctx, &scene, RenderMode::Opaque);
    assert_eq!(stats.batches, 2);
    assert_eq!(draws(&f.device), vec![(hull_fx, 3, 3), (hull_fx, 0, 3)]);

    let stats = render(&f.ctx, &scene, RenderMode::Transparent);
    assert_eq!(stats.batches, 1);
    assert_eq!(draws(&f.device), vec![(glass_fx, 0, 6)]);
    assert_eq!(render(&f.ctx, &scene, RenderMode::Additive).batches, 0);

    // Idle geometry is purged and the binding drops its cache
    let geometry = f.ctx.registry().resource("quad.geo").unwrap();
    for _ in 0..10 {
        f.ctx.frame();
        if geometry.state() == LoadState::Purged {
            break;
        }
    }
    assert_eq!(geometry.state(), LoadState::Purged);
    assert_eq!(binding.release_count(), 1);
    assert!(!binding.is_valid());
    assert_eq!(f.device.live_buffer_count(), 0);

    // Drawing a purged mesh requests the reload and draws nothing this frame
    assert_eq!(render(&f.ctx, &scene, RenderMode::Opaque).batches, 0);
    assert_eq!(geometry.state(), LoadState::Loading);
    f.ctx.frame();
    assert_eq!(binding.rebuild_count(), 2);
    assert_eq!(f.fetcher.request_count("quad.geo"), 2);
    f.device.take_commands();
    assert_eq!(render(&f.ctx, &scene, RenderMode::Opaque).batches, 2);
    assert_eq!(draws(&f.device), vec![(hull_fx, 3, 3), (hull_fx, 0, 3)]);

    f.ctx.shutdown();
    assert_eq!(f.device.live_buffer_count(), 0);
    assert_eq!(f.ctx.stats().resources, 0);
}

#[test]
fn test_every_request_gets_its_own_scene() {
    let mut f = fixture(TrinityConfig::default());
    let first = load(&f.ctx, "scenes/bridge.red");
    let second = load(&f.ctx, "Scenes\\Bridge.red");

    let report = f.ctx.frame();
    assert_eq!(report.objects_constructed, 2);
    assert_eq!(f.fetcher.request_count("scenes/bridge.red"), 1);

    let a = first.lock().take().unwrap().unwrap();
    let b = second.lock().take().unwrap().unwrap();
    assert_ne!(a, b);
    assert_eq!(trinity_reader::dump::to_json(&a), trinity_reader::dump::to_json(&b));

    // Both scenes share the one cached geometry
    let geometry_a = a.with_object(|s: &Scene| s.objects()[0].with_object(|m: &Mesh| m.geometry().cloned()));
    let geometry_b = b.with_object(|s: &Scene| s.objects()[0].with_object(|m: &Mesh| m.geometry().cloned()));
    let (Some(Some(Some(ga))), Some(Some(Some(gb)))) = (geometry_a, geometry_b) else {
        panic!("meshes were not bound");
    };
    assert!(Arc::ptr_eq(&ga, &gb));
}

#[test]
fn test_missing_object_file_reports_through_callback() {
    let mut f = fixture(TrinityConfig::default());
    let slot = load(&f.ctx, "scenes/missing.red");

    f.ctx.frame();
    let result = slot.lock().take().unwrap();
    assert!(matches!(result, Err(ReaderError::LoadFailed(_))));
    assert_eq!(f.ctx.loader().pending(), 0);
}

#[test]
fn test_config_file_drives_budgets() {
    let config = TrinityConfig::from_json_str(
        r#"{ "registry": { "idle_frame_limit": 5 }, "reader": { "construct_budget_ms": 2 } }"#,
    )
    .unwrap();
    let f = fixture(config);
    assert_eq!(f.ctx.config().registry.idle_frame_limit, 5);
    assert_eq!(f.ctx.config().reader.construct_budget_ms, 2);

    let error: trinity::Error = ReaderError::LoadFailed("x.red".into()).into();
    assert!(error.to_string().contains("x.red"));
}
