//! Integration tests for trinity_reader

use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use trinity_core::{Clock, FrameBudget, HeadlessDevice, ManualClock};
use trinity_reader::*;
use trinity_resource::{DeferredFetcher, MemoryFetcher, RegistryConfig, ResourceRegistry};

const FLEET: &str = r#"
<fleet type="Fleet" id="fleet">
    <name>Home Guard</name>
    <ships list="1">
        <ship type="Ship" id="flagship">
            <name>Avatar</name>
            <speed>120.5</speed>
            <crew>4200</crew>
            <cloaked>off</cloaked>
            <hardpoints json="">[1, 2, 3.5]</hardpoints>
            <loadout json="" notnum="">{"missiles": 8}</loadout>
            <fleet ref="fleet"/>
        </ship>
        <ship type="Ship">
            <name>Scout</name>
            <speed>300.0</speed>
            <crew>3</crew>
            <cloaked>yes</cloaked>
            <escort ref="flagship"/>
            <fleet ref="fleet"/>
        </ship>
        <ship ref="flagship"/>
    </ships>
    <tags list="1"><t>alpha</t><t>7</t><t type="dict"><note>spare</note></t></tags>
    <motd>Fly safe</motd>
</fleet>
"#;

/// Clock that moves one millisecond every time it is read
#[derive(Default)]
struct SteppingClock {
    millis: AtomicU64,
}

impl Clock for SteppingClock {
    fn now(&self) -> Duration {
        Duration::from_millis(self.millis.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Default)]
struct Fleet {
    name: String,
    ships: Value,
    tags: Value,
    initialized_after: Vec<String>,
}

impl ReadObject for Fleet {
    fn type_name(&self) -> &str {
        "Fleet"
    }

    fn set_field(&mut self, name: &str, value: Value) -> std::result::Result<(), FieldError> {
        match name {
            "name" => self.name = value.as_str().unwrap_or_default().to_string(),
            "ships" => self.ships = value,
            "tags" => self.tags = value,
            _ => return Err(FieldError::unknown("Fleet", name)),
        }
        Ok(())
    }

    fn get_field(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::from(self.name.as_str())),
            "ships" => Some(self.ships.clone()),
            "tags" => Some(self.tags.clone()),
            _ => None,
        }
    }

    fn field_names(&self) -> Vec<String> {
        vec!["name".into(), "ships".into(), "tags".into()]
    }

    fn needs_initialize(&self) -> bool {
        true
    }

    fn initialize(&mut self, _ctx: &InitContext<'_>) {
        // Ships are initialized before their fleet
        if let Some(ships) = self.ships.as_list() {
            for ship in ships.read().iter() {
                if let Some(name) = ship.with_object(|s: &Ship| (s.initialized, s.name.clone())) {
                    if name.0 {
                        self.initialized_after.push(name.1);
                    }
                }
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[derive(Default)]
struct Ship {
    name: String,
    speed: f64,
    crew: i64,
    cloaked: bool,
    hardpoints: Vec<f32>,
    loadout: Value,
    escort: Value,
    fleet: Value,
    initialized: bool,
}

impl ReadObject for Ship {
    fn type_name(&self) -> &str {
        "Ship"
    }

    fn set_field(&mut self, name: &str, value: Value) -> std::result::Result<(), FieldError> {
        let mismatch = |expected| FieldError::mismatch("Ship", name, expected, value.kind_name());
        match name {
            "name" => self.name = value.as_str().ok_or_else(|| mismatch("string"))?.to_string(),
            "speed" => self.speed = value.as_f64().ok_or_else(|| mismatch("number"))?,
            "crew" => self.crew = value.as_i64().ok_or_else(|| mismatch("int"))?,
            "cloaked" => self.cloaked = value.as_bool().ok_or_else(|| mismatch("bool"))?,
            "hardpoints" => self.hardpoints = value.as_floats().ok_or_else(|| mismatch("float array"))?.to_vec(),
            "loadout" => self.loadout = value,
            "escort" => self.escort = value,
            "fleet" => self.fleet = value,
            _ => return Err(FieldError::unknown("Ship", name)),
        }
        Ok(())
    }

    fn get_field(&self, name: &str) -> Option<Value> {
        match name {
            "name" => Some(Value::from(self.name.as_str())),
            "speed" => Some(Value::Float(self.speed)),
            "crew" => Some(Value::Int(self.crew)),
            "cloaked" => Some(Value::Bool(self.cloaked)),
            "hardpoints" => Some(Value::Floats(self.hardpoints.clone())),
            "loadout" => Some(self.loadout.clone()),
            "escort" => Some(self.escort.clone()),
            "fleet" => Some(self.fleet.clone()),
            "initialized" => Some(Value::Bool(self.initialized)),
            _ => None,
        }
    }

    fn field_names(&self) -> Vec<String> {
        ["name", "speed", "crew", "cloaked", "hardpoints", "loadout", "escort", "fleet", "initialized"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn needs_initialize(&self) -> bool {
        true
    }

    fn initialize(&mut self, _ctx: &InitContext<'_>) {
        self.initialized = true;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn types() -> Arc<TypeRegistry> {
    let mut types = TypeRegistry::new();
    types.register::<Fleet>("Fleet");
    types.register::<Ship>("Ship");
    Arc::new(types)
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_budgeted_read_matches_unbounded_read() {
    init_logger();
    let root = Node::parse_xml(FLEET).unwrap();

    let unbounded = ObjectReader::new(root.clone(), types())
        .run_to_completion(&InitContext::new())
        .unwrap();

    let clock = SteppingClock::default();
    let mut reader = ObjectReader::new(root, types());
    let mut resumptions = 0;
    loop {
        let budget = FrameBudget::from_millis(&clock, 3);
        match reader.step(&budget, &InitContext::new()).unwrap() {
            ReadStatus::Done => break,
            ReadStatus::Pending => resumptions += 1,
        }
        assert!(resumptions < 1000);
    }

    assert!(resumptions >= 3, "only {} resumptions", resumptions);
    let budgeted = reader.take_result().unwrap();
    assert_eq!(dump::to_json(&budgeted), dump::to_json(&unbounded));
}

#[test]
fn test_fleet_contents() {
    let value = ObjectReader::new(Node::parse_xml(FLEET).unwrap(), types())
        .run_to_completion(&InitContext::new())
        .unwrap();
    let fleet = value.as_object().unwrap().clone();

    let ships = value.with_object(|f: &Fleet| f.ships.clone()).unwrap();
    let ships = ships.as_list().unwrap().read().clone();
    assert_eq!(ships.len(), 3);

    // Back-references resolve to the same instances
    let flagship = ships[0].as_object().unwrap();
    assert!(Arc::ptr_eq(flagship, ships[2].as_object().unwrap()));
    let escort = ships[1].with_object(|s: &Ship| s.escort.clone()).unwrap();
    assert!(Arc::ptr_eq(flagship, escort.as_object().unwrap()));
    let back = ships[0].with_object(|s: &Ship| s.fleet.clone()).unwrap();
    assert!(Arc::ptr_eq(&fleet, back.as_object().unwrap()));

    let (speed, crew, cloaked, hardpoints, loadout) = ships[0]
        .with_object(|s: &Ship| (s.speed, s.crew, s.cloaked, s.hardpoints.clone(), s.loadout.clone()))
        .unwrap();
    approx::assert_relative_eq!(speed, 120.5);
    assert_eq!(crew, 4200);
    assert!(!cloaked);
    assert_eq!(hardpoints, vec![1.0, 2.0, 3.5]);
    assert_eq!(loadout, Value::Json(serde_json::json!({"missiles": 8})));
    assert_eq!(ships[1].with_object(|s: &Ship| s.cloaked), Some(true));

    // Unknown field skipped, initialize ran after every ship
    let (name, initialized_after) = value
        .with_object(|f: &Fleet| (f.name.clone(), f.initialized_after.clone()))
        .unwrap();
    assert_eq!(name, "Home Guard");
    assert_eq!(initialized_after, vec!["Avatar", "Scout", "Avatar"]);

    let tags = value.with_object(|f: &Fleet| f.tags.clone()).unwrap();
    let tags = tags.as_list().unwrap().read().clone();
    assert_eq!(tags[0], Value::from("alpha"));
    assert_eq!(tags[1], Value::Int(7));
    assert_eq!(tags[2].with_object(|d: &Dict| d.get("note").cloned()).flatten(), Some(Value::from("spare")));
}

#[test]
fn test_unknown_type_aborts_only_that_read() {
    let broken = Node::parse_xml(r#"<fleet type="Fleet"><ships list="1"><s type="Frigate"/></ships></fleet>"#).unwrap();
    let err = ObjectReader::new(broken, types())
        .run_to_completion(&InitContext::new())
        .unwrap_err();
    assert!(err.to_string().contains("Frigate"));

    // A later read with the same registry is unaffected
    let ok = ObjectReader::new(Node::parse_xml(FLEET).unwrap(), types()).run_to_completion(&InitContext::new());
    assert!(ok.is_ok());
}

fn registry_with(fetcher: Arc<dyn trinity_resource::Fetcher>, clock: Arc<ManualClock>) -> ResourceRegistry {
    ResourceRegistry::with_clock(RegistryConfig::default(), Arc::new(HeadlessDevice::new()), fetcher, clock)
}

#[test]
fn test_loader_waits_for_fetch_and_builds_fresh_graphs() {
    init_logger();
    let clock = Arc::new(ManualClock::new());
    let fetcher = Arc::new(DeferredFetcher::new());
    let registry = registry_with(fetcher.clone(), clock.clone());
    let loader = ObjectLoader::new(registry.clone(), types(), ReaderConfig::default());

    let results: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..2 {
        let sink = results.clone();
        loader.get_object("res:/fleets/home.red", move |r| sink.lock().push(r.unwrap()));
    }
    assert_eq!(fetcher.pending_count(), 1);

    registry.tick();
    assert_eq!(loader.tick(&FrameBudget::unlimited(clock.as_ref())), 0);
    assert_eq!(loader.pending(), 2);

    fetcher.complete_next(FLEET.as_bytes());
    registry.tick();
    assert_eq!(loader.tick(&FrameBudget::unlimited(clock.as_ref())), 2);

    let results = results.lock();
    assert_eq!(results.len(), 2);
    assert!(!Arc::ptr_eq(results[0].as_object().unwrap(), results[1].as_object().unwrap()));
    assert_eq!(dump::to_json(&results[0]), dump::to_json(&results[1]));
}

#[test]
fn test_loader_spreads_requests_over_frames() {
    let clock = Arc::new(ManualClock::new());
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.insert("a.red", FLEET);
    let registry = registry_with(fetcher, clock.clone());
    let loader = ObjectLoader::new(registry.clone(), types(), ReaderConfig::default());

    let done = Arc::new(Mutex::new(0));
    for _ in 0..3 {
        let done = done.clone();
        loader.get_object("a.red", move |r| {
            assert!(r.is_ok());
            *done.lock() += 1;
        });
    }
    registry.tick();

    // A zero budget lets exactly one unit of one reader run per tick
    let mut ticks = 0;
    while loader.pending() > 0 {
        loader.tick(&FrameBudget::zero(clock.as_ref()));
        ticks += 1;
        assert!(ticks < 10_000);
    }
    assert_eq!(*done.lock(), 3);
    assert!(ticks > 3);
}

#[test]
fn test_loader_reports_failures() {
    let clock = Arc::new(ManualClock::new());
    let fetcher = Arc::new(MemoryFetcher::new());
    fetcher.insert("bad.red", r#"<fleet type="Fleet"><x type="Nope"/></fleet>"#);
    let registry = registry_with(fetcher, clock.clone());
    let loader = ObjectLoader::new(registry.clone(), types(), ReaderConfig::default());

    let errors: Arc<Mutex<Vec<ReaderError>>> = Arc::new(Mutex::new(Vec::new()));
    for path in ["missing.red", "bad.red", "unknown.ext"] {
        let sink = errors.clone();
        loader.get_object(path, move |r| {
            if let Err(e) = r {
                sink.lock().push(e);
            }
        });
    }
    registry.tick();
    loader.tick(&FrameBudget::unlimited(clock.as_ref()));

    let errors = errors.lock();
    assert_eq!(errors.len(), 3);
    assert_eq!(errors[0], ReaderError::LoadFailed("missing.red".into()));
    assert!(matches!(errors[1], ReaderError::UnknownType { .. }));
    assert_eq!(errors[2], ReaderError::LoadFailed("unknown.ext".into()));
}
