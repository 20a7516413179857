//! End-to-end tests that run the binary against local git repositories.

mod common;

use common::prelude::*;

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_import_then_inspect() {
    let Some(world) = GitWorld::new() else { return };
    let driver = world.create("driver", &[("driver.c", "int driver;\n")]);
    world.create(
        "prog",
        &[
            ("main.c", "int main;\n"),
            ("driver.lib", world.pointer("driver", &driver).as_str()),
        ],
    );

    world
        .command(&world.work())
        .arg("import")
        .arg(world.url("prog"))
        .assert()
        .success()
        .stderr(predicate::str::contains("[reftree] Importing program"))
        .stderr(predicate::str::contains("Adding library \"driver\""));

    let prog = world.work().join("prog");
    assert!(prog.join("driver/driver.c").is_file());

    world
        .command(&prog)
        .arg("ls")
        .assert()
        .success()
        .stdout(predicate::str::contains("prog ("))
        .stdout(predicate::str::contains(format!("driver ({})", &driver[..12])));

    world
        .command(&prog)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No local modifications."));

    world.command(&prog).arg("sync").assert().success();
    assert_eq!(
        std::fs::read_to_string(prog.join("driver.lib")).unwrap(),
        world.pointer("driver", &driver)
    );
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_import_refuses_non_empty_directory() {
    let Some(world) = GitWorld::new() else { return };
    world.create("prog", &[("main.c", "int main;\n")]);
    let target = world.work().join("prog");
    std::fs::create_dir_all(&target).unwrap();
    std::fs::write(target.join("a.txt"), "a").unwrap();
    std::fs::write(target.join("b.txt"), "b").unwrap();

    world
        .command(&world.work())
        .arg("import")
        .arg(world.url("prog"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("is not empty"));
}
