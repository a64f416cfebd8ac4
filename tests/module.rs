use bindery::{combine_modules, modules, override_module, BindErrorKind, Binder, BuildErrorKind, Implements, Injector, Key};
use std::sync::Arc;
use tracing_test::traced_test;

trait Storage: Send + Sync {
    fn name(&self) -> &'static str;
}

struct Disk;
struct Memory;

impl Storage for Disk {
    fn name(&self) -> &'static str {
        "disk"
    }
}

impl Storage for Memory {
    fn name(&self) -> &'static str {
        "memory"
    }
}

struct Endpoint(&'static str);

fn storage_module(binder: &mut Binder) -> Result<(), BindErrorKind> {
    binder.bind::<dyn Storage>().to_instance(Arc::new(Disk))?;
    binder.bind_instance(Arc::new(Endpoint("prod")))?;
    Ok(())
}

fn test_storage_module(binder: &mut Binder) -> Result<(), BindErrorKind> {
    binder.bind::<dyn Storage>().to_instance(Arc::new(Memory))?;
    Ok(())
}

#[test]
#[traced_test]
fn test_combined_modules() {
    let mut implements = Implements::new();
    implements.add_implement(
        "all",
        combine_modules(modules![
            |binder: &mut Binder| -> Result<(), BindErrorKind> {
                binder.bind_provider(|cx| Ok(Arc::new(Endpoint(cx.require::<dyn Storage>()?.name()))))?;
                Ok(())
            },
            test_storage_module
        ]),
    );

    let injector = implements.new_injector(&["all"]).unwrap();
    assert_eq!(injector.require::<Endpoint>().unwrap().0, "memory");
}

#[test]
#[traced_test]
fn test_override_module() {
    let overridden = || override_module(modules![storage_module]).with(modules![test_storage_module]);

    let injector = Injector::create(modules![overridden()]).unwrap();
    assert_eq!(injector.require::<dyn Storage>().unwrap().name(), "memory");
    assert_eq!(injector.require::<Endpoint>().unwrap().0, "prod");

    let mut implements = Implements::new();
    implements.add_implement("base", storage_module);
    implements.add_implement("overridden", overridden());
    assert!(matches!(
        implements.new_injector(&["overridden", "base"]),
        Err(BuildErrorKind::Bind(BindErrorKind::Duplicate { key })) if key == Key::of::<dyn Storage>()
    ));
}

#[test]
#[traced_test]
fn test_duplicate_without_override() {
    let result = Injector::create(modules![storage_module, test_storage_module]);

    assert!(matches!(
        result,
        Err(BuildErrorKind::Bind(BindErrorKind::Duplicate { key })) if key == Key::of::<dyn Storage>()
    ));
}

#[test]
#[traced_test]
fn test_anonymous_first_binding_survives() {
    let mut implements = Implements::new();
    implements.add_bind(test_storage_module);
    implements.add_bind(storage_module);

    let injector = implements.new_injector(&[]).unwrap();
    assert_eq!(injector.require::<dyn Storage>().unwrap().name(), "memory");
    assert_eq!(injector.require::<Endpoint>().unwrap().0, "prod");
}
