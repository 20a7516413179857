//! Workflow scenarios driven through the library API against real local git
//! repositories.
//!
//! Every test builds its own upstreams with [`GitWorld`] and skips itself when
//! git is not installed.

mod common;

use std::fs;
use std::path::Path;

use common::prelude::*;
use reftree::cache::Cache;
use reftree::error::{BlockReason, Error};
use reftree::workflows::{self, Context, FixedMessage, SyncOptions, UpdateFlags};

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

/// Let reftree commit in a checkout it cloned.
fn configure_identity(dir: &Path) {
    git(dir, &["config", "user.name", "Reftree Tests"]);
    git(dir, &["config", "user.email", "tests@example.com"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

#[test]
fn test_import_deploys_every_declared_dependency() {
    let Some(world) = GitWorld::new() else { return };
    let driver = world.create("driver", &[("driver.c", "int driver;\n")]);
    let hal = world.create("hal", &[("hal.c", "int hal;\n")]);
    world.create(
        "prog",
        &[
            ("main.c", "int main;\n"),
            ("driver.lib", world.pointer("driver", &driver).as_str()),
            ("hal.lib", world.pointer("hal", &hal).as_str()),
        ],
    );

    let ctx = Context::new(world.work());
    let prog = workflows::import(&ctx, &world.url("prog"), None).unwrap();

    assert_eq!(prog, world.work().join("prog"));
    assert!(prog.join("main.c").is_file());
    assert!(prog.join(".reftree").is_file());
    assert_eq!(head(&prog.join("driver")), driver);
    assert_eq!(head(&prog.join("hal")), hal);
    assert!(prog.join("driver/driver.c").is_file());
    assert!(prog.join("hal/hal.c").is_file());

    // Dependency directories are ignored by the program checkout
    let exclude = read(&prog.join(".git/info/exclude"));
    assert!(exclude.contains("# subrepo ignores"));
    assert!(exclude.lines().any(|l| l == "driver"));
    assert!(exclude.lines().any(|l| l == "hal"));
}

#[test]
fn test_four_level_chain_resolves_at_pinned_revisions() {
    let Some(world) = GitWorld::new() else { return };
    let c1 = world.create("c", &[("c.txt", "c1\n")]);
    // A later revision of c must not be picked up
    world.commit("c", &[("c.txt", "c2\n")], "Second revision");
    let b1 = world.create(
        "b",
        &[("b.txt", "b\n"), ("c.lib", world.pointer("c", &c1).as_str())],
    );
    let a1 = world.create(
        "a",
        &[("a.txt", "a\n"), ("b.lib", world.pointer("b", &b1).as_str())],
    );
    world.create(
        "prog",
        &[("main.c", "int main;\n"), ("a.lib", world.pointer("a", &a1).as_str())],
    );

    let ctx = Context::new(world.work());
    let prog = workflows::import(&ctx, &world.url("prog"), None).unwrap();

    let c = prog.join("a/b/c");
    assert_eq!(head(&prog.join("a")), a1);
    assert_eq!(head(&prog.join("a/b")), b1);
    assert_eq!(head(&c), c1);
    assert_eq!(read(&c.join("c.txt")), "c1\n");

    let tree = workflows::tree(&Context::new(&prog), &prog).unwrap();
    assert_eq!(tree.count(), 4);
    assert_eq!(tree.children[0].label, "a");
    assert_eq!(tree.children[0].children[0].children[0].rev.as_deref(), Some(c1.as_str()));
}

#[test]
fn test_add_then_sync_tracks_new_revisions() {
    let Some(world) = GitWorld::new() else { return };
    world.create("prog", &[("main.c", "int main;\n")]);
    let lib1 = world.create("lib", &[("lib.c", "int v1;\n")]);

    let prog = workflows::import(&Context::new(world.work()), &world.url("prog"), None).unwrap();
    let ctx = Context::new(&prog);
    let lib = workflows::add(&ctx, &world.url("lib"), None).unwrap();

    assert_eq!(lib, prog.join("lib"));
    assert_eq!(read(&prog.join("lib.lib")), world.pointer("lib", &lib1));
    let staged = git(&prog, &["diff", "--cached", "--name-only"]);
    assert!(staged.lines().any(|l| l == "lib.lib"));

    // Move the checkout by hand; sync absorbs the new revision
    let lib2 = world.commit("lib", &[("lib.c", "int v2;\n")], "Second revision");
    git(&lib, &["pull", "-q", "--ff-only", "origin", "main"]);
    workflows::sync(&ctx, &prog, SyncOptions::default(), true).unwrap();
    assert_eq!(read(&prog.join("lib.lib")), world.pointer("lib", &lib2));
}

#[test]
fn test_sync_is_idempotent() {
    let Some(world) = GitWorld::new() else { return };
    let driver = world.create("driver", &[("driver.c", "int driver;\n")]);
    world.create(
        "prog",
        &[
            ("main.c", "int main;\n"),
            ("driver.lib", world.pointer("driver", &driver).as_str()),
        ],
    );
    let prog = workflows::import(&Context::new(world.work()), &world.url("prog"), None).unwrap();
    let ctx = Context::new(&prog);

    workflows::sync(&ctx, &prog, SyncOptions::default(), true).unwrap();
    let first = read(&prog.join("driver.lib"));
    workflows::sync(&ctx, &prog, SyncOptions::default(), true).unwrap();

    assert_eq!(read(&prog.join("driver.lib")), first);
    assert_eq!(first, world.pointer("driver", &driver));
    // Nothing tracked changed, so the program has nothing to commit
    assert_eq!(git(&prog, &["status", "--porcelain", "-uno"]), "");
}

#[test]
fn test_sync_registers_unlinked_checkout() {
    let Some(world) = GitWorld::new() else { return };
    world.create("prog", &[("main.c", "int main;\n")]);
    let extra = world.create("extra", &[("extra.c", "int extra;\n")]);
    let prog = workflows::import(&Context::new(world.work()), &world.url("prog"), None).unwrap();

    // A checkout cloned by hand, without a pointer file
    git(&prog, &["clone", "-q", &world.url("extra"), "extra"]);
    let ctx = Context::new(&prog);
    workflows::sync(&ctx, &prog, SyncOptions::default(), true).unwrap();

    assert_eq!(read(&prog.join("extra.lib")), world.pointer("extra", &extra));
    let staged = git(&prog, &["diff", "--cached", "--name-only"]);
    assert!(staged.lines().any(|l| l == "extra.lib"));
}

#[test]
fn test_remove_then_add_again() {
    let Some(world) = GitWorld::new() else { return };
    world.create("prog", &[("main.c", "int main;\n")]);
    let lib1 = world.create("lib", &[("lib.c", "int lib;\n")]);
    let prog = workflows::import(&Context::new(world.work()), &world.url("prog"), None).unwrap();
    let ctx = Context::new(&prog);

    workflows::add(&ctx, &world.url("lib"), None).unwrap();
    workflows::remove(&ctx, Path::new("lib")).unwrap();
    assert!(!prog.join("lib").exists());
    assert!(!prog.join("lib.lib").exists());
    let exclude = read(&prog.join(".git/info/exclude"));
    assert!(!exclude.lines().any(|l| l == "lib"));

    workflows::add(&ctx, &world.url("lib"), None).unwrap();
    assert_eq!(head(&prog.join("lib")), lib1);
    assert_eq!(read(&prog.join("lib.lib")), world.pointer("lib", &lib1));
}

#[test]
fn test_update_removes_dependency_dropped_upstream() {
    let Some(world) = GitWorld::new() else { return };
    let lib = world.create("lib", &[("lib.c", "int lib;\n")]);
    world.create(
        "prog",
        &[
            ("main.c", "int main;\n"),
            ("lib.lib", world.pointer("lib", &lib).as_str()),
        ],
    );
    let prog = workflows::import(&Context::new(world.work()), &world.url("prog"), None).unwrap();
    assert!(prog.join("lib").is_dir());

    let v2 = world.delete("prog", "lib.lib", "Drop lib");
    let ctx = Context::new(&prog);
    workflows::update(&ctx, &prog, None, UpdateFlags::default(), true).unwrap();

    assert_eq!(head(&prog), v2);
    assert!(!prog.join("lib.lib").exists());
    assert!(!prog.join("lib").exists());
}

#[test]
fn test_update_refuses_to_discard_uncommitted_changes() {
    let Some(world) = GitWorld::new() else { return };
    let lib = world.create("lib", &[("lib.c", "int lib;\n")]);
    world.create(
        "prog",
        &[
            ("main.c", "int main;\n"),
            ("lib.lib", world.pointer("lib", &lib).as_str()),
        ],
    );
    let prog = workflows::import(&Context::new(world.work()), &world.url("prog"), None).unwrap();
    fs::write(prog.join("lib/lib.c"), "int edited;\n").unwrap();

    world.delete("prog", "lib.lib", "Drop lib");
    let ctx = Context::new(&prog);
    let err = workflows::update(&ctx, &prog, None, UpdateFlags::default(), true).unwrap_err();

    match err.innermost() {
        Error::DivergenceBlocked { name, reason, .. } => {
            assert_eq!(name, "lib");
            assert_eq!(*reason, BlockReason::Dirty);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(read(&prog.join("lib/lib.c")), "int edited;\n");
}

/// The four-level chain `test1 -> test2 -> test3 -> test4`, imported.
fn import_chain(world: &GitWorld) -> std::path::PathBuf {
    let t4 = world.create("test4", &[("test4.txt", "4\n")]);
    let t3 = world.create(
        "test3",
        &[("test3.txt", "3\n"), ("test4.lib", world.pointer("test4", &t4).as_str())],
    );
    let t2 = world.create(
        "test2",
        &[("test2.txt", "2\n"), ("test3.lib", world.pointer("test3", &t3).as_str())],
    );
    world.create(
        "test1",
        &[("test1.txt", "1\n"), ("test2.lib", world.pointer("test2", &t2).as_str())],
    );
    workflows::import(&Context::new(world.work()), &world.url("test1"), None).unwrap()
}

fn pointer_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .filter(|n| n.ends_with(".lib") || n.ends_with(".bld"))
        .collect();
    names.sort();
    names
}

#[test]
fn test_chain_gains_sibling_after_add_and_sync() {
    let Some(world) = GitWorld::new() else { return };
    let test1 = import_chain(&world);
    assert!(test1.join("test2/test3/test4/test4.txt").is_file());
    assert_eq!(pointer_files(&test1), vec!["test2.lib"]);

    let ctx = Context::new(&test1);
    workflows::add(&ctx, &world.url("test3"), None).unwrap();
    workflows::sync(&ctx, &test1, SyncOptions::default(), true).unwrap();

    assert_eq!(pointer_files(&test1), vec!["test2.lib", "test3.lib"]);
    let tree = workflows::tree(&ctx, &test1).unwrap();
    let top: Vec<&str> = tree.children.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(top, vec!["test2", "test3"]);
    assert_eq!(tree.children[0].children[0].label, "test3");
    assert_eq!(tree.children[0].children[0].children[0].label, "test4");
    assert_eq!(tree.children[1].children[0].label, "test4");
    assert_eq!(tree.count(), 6);
}

#[test]
fn test_removed_dependency_is_gone_from_fresh_import() {
    let Some(world) = GitWorld::new() else { return };
    let test1 = import_chain(&world);
    configure_identity(&test1);

    let ctx = Context::new(&test1);
    workflows::remove(&ctx, Path::new("test2")).unwrap();
    workflows::sync(&ctx, &test1, SyncOptions::default(), true).unwrap();
    let prompt = FixedMessage("unused".to_string());
    workflows::publish(&ctx, &test1, false, Some("Remove test2"), &prompt, true).unwrap();

    let fresh = workflows::import(
        &Context::new(world.work()),
        &world.url("test1"),
        Some(Path::new("fresh")),
    )
    .unwrap();
    assert!(fresh.join("test1.txt").is_file());
    assert!(!fresh.join("test2").exists());
    assert!(pointer_files(&fresh).is_empty());
    assert_eq!(workflows::tree(&Context::new(&fresh), &fresh).unwrap().count(), 1);
}

#[test]
fn test_update_replaces_dependency_with_changed_url() {
    let Some(world) = GitWorld::new() else { return };
    let lib = world.create("lib", &[("lib.c", "int lib;\n")]);
    let other = world.create("other", &[("other.c", "int other;\n")]);
    world.create(
        "prog",
        &[
            ("main.c", "int main;\n"),
            ("lib.lib", world.pointer("lib", &lib).as_str()),
        ],
    );
    let prog = workflows::import(&Context::new(world.work()), &world.url("prog"), None).unwrap();
    assert!(prog.join("lib/lib.c").is_file());

    // Same directory, different upstream
    world.commit(
        "prog",
        &[("lib.lib", world.pointer("other", &other).as_str())],
        "Point lib at another repository",
    );
    let ctx = Context::new(&prog);
    workflows::update(&ctx, &prog, None, UpdateFlags::default(), true).unwrap();

    let lib_dir = prog.join("lib");
    assert_eq!(head(&lib_dir), other);
    assert!(lib_dir.join("other.c").is_file());
    assert!(!lib_dir.join("lib.c").exists());
}

#[test]
fn test_update_refuses_to_discard_unpublished_commits() {
    let Some(world) = GitWorld::new() else { return };
    let lib = world.create("lib", &[("lib.c", "int lib;\n")]);
    world.create(
        "prog",
        &[
            ("main.c", "int main;\n"),
            ("lib.lib", world.pointer("lib", &lib).as_str()),
        ],
    );
    let prog = workflows::import(&Context::new(world.work()), &world.url("prog"), None).unwrap();
    let lib_dir = prog.join("lib");
    fs::write(lib_dir.join("lib.c"), "int local;\n").unwrap();
    git(&lib_dir, &["commit", "-q", "-a", "-m", "Local only"]);
    let local = head(&lib_dir);

    world.delete("prog", "lib.lib", "Drop lib");
    let ctx = Context::new(&prog);
    let err = workflows::update(&ctx, &prog, None, UpdateFlags::default(), true).unwrap_err();

    match err.innermost() {
        Error::DivergenceBlocked { name, reason, .. } => {
            assert_eq!(name, "lib");
            assert_eq!(*reason, BlockReason::Unpublished);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(head(&lib_dir), local);
}

#[test]
fn test_update_follows_branch_pointer() {
    let Some(world) = GitWorld::new() else { return };
    let lib1 = world.create("lib", &[("lib.c", "int v1;\n")]);
    world.create(
        "prog",
        &[
            ("main.c", "int main;\n"),
            ("lib.lib", world.pointer("lib", "main").as_str()),
        ],
    );
    let prog = workflows::import(&Context::new(world.work()), &world.url("prog"), None).unwrap();
    let lib = prog.join("lib");
    assert_eq!(head(&lib), lib1);

    let lib2 = world.commit("lib", &[("lib.c", "int v2;\n")], "Second revision");
    let ctx = Context::new(&prog);
    workflows::update(&ctx, &prog, None, UpdateFlags::default(), true).unwrap();

    assert_eq!(head(&lib), lib2);
    assert_eq!(read(&lib.join("lib.c")), "int v2;\n");
}

#[test]
fn test_update_clean_removes_untracked_files() {
    let Some(world) = GitWorld::new() else { return };
    let lib = world.create("lib", &[("lib.c", "int lib;\n")]);
    world.create(
        "prog",
        &[
            ("main.c", "int main;\n"),
            ("lib.lib", world.pointer("lib", &lib).as_str()),
        ],
    );
    let prog = workflows::import(&Context::new(world.work()), &world.url("prog"), None).unwrap();
    let lib_dir = prog.join("lib");
    fs::write(lib_dir.join("lib.c"), "int edited;\n").unwrap();
    fs::write(lib_dir.join("stray.c"), "int stray;\n").unwrap();

    let ctx = Context::new(&prog);
    let flags = UpdateFlags {
        clean: true,
        ..UpdateFlags::default()
    };
    workflows::update(&ctx, &prog, None, flags, true).unwrap();

    assert_eq!(read(&lib_dir.join("lib.c")), "int lib;\n");
    assert!(!lib_dir.join("stray.c").exists());
    assert_eq!(head(&lib_dir), lib);
}

#[test]
fn test_import_reuses_cached_repository() {
    let Some(world) = GitWorld::new() else { return };
    let lib = world.create("lib", &[("lib.c", "int lib;\n")]);
    let lib_url = format!("file://{}", world.url("lib"));
    world.create(
        "prog",
        &[
            ("main.c", "int main;\n"),
            ("lib.lib", format!("{}/#{}\n", lib_url, lib).as_str()),
        ],
    );
    let cache_dir = world.path().join("cache");
    let ctx = Context::new(world.work()).with_cache(Some(Cache::new(&cache_dir)));

    workflows::import(&ctx, &world.url("prog"), None).unwrap();
    let entry = Cache::new(&cache_dir).lookup(&lib_url).unwrap();
    assert!(entry.join(".git").is_dir());
    assert!(!entry.join("lib.c").exists());

    // Only a copy taken from the cache carries this file
    fs::write(entry.join(".git/cached-copy"), "").unwrap();
    let copy = workflows::import(&ctx, &world.url("prog"), Some(Path::new("copy"))).unwrap();

    let copied_lib = copy.join("lib");
    assert!(copied_lib.join(".git/cached-copy").is_file());
    assert_eq!(head(&copied_lib), lib);
    assert_eq!(read(&copied_lib.join("lib.c")), "int lib;\n");
}

#[test]
fn test_sync_ignore_mode_covers_unlinked_checkouts() {
    let Some(world) = GitWorld::new() else { return };
    world.create("prog", &[("main.c", "int main;\n")]);
    world.create("extra", &[("extra.c", "int extra;\n")]);
    let prog = workflows::import(&Context::new(world.work()), &world.url("prog"), None).unwrap();

    git(&prog, &["clone", "-q", &world.url("extra"), "extra"]);
    // A directory where the pointer file would go makes writing it fail
    fs::create_dir_all(prog.join("extra.lib")).unwrap();

    let err = workflows::sync(&Context::new(&prog), &prog, SyncOptions::default(), true)
        .unwrap_err();
    assert!(matches!(err.innermost(), Error::Io(_)));

    let ctx = Context::new(&prog).with_ignore(true);
    workflows::sync(&ctx, &prog, SyncOptions::default(), true).unwrap();
    assert!(prog.join("extra.lib").is_dir());
}

#[test]
fn test_update_moves_dependency_to_new_pinned_revision() {
    let Some(world) = GitWorld::new() else { return };
    let lib1 = world.create("lib", &[("lib.c", "int v1;\n")]);
    world.create(
        "prog",
        &[
            ("main.c", "int main;\n"),
            ("lib.lib", world.pointer("lib", &lib1).as_str()),
        ],
    );
    let prog = workflows::import(&Context::new(world.work()), &world.url("prog"), None).unwrap();

    let lib2 = world.commit("lib", &[("lib.c", "int v2;\n")], "Second revision");
    world.commit(
        "prog",
        &[("lib.lib", world.pointer("lib", &lib2).as_str())],
        "Bump lib",
    );
    let ctx = Context::new(&prog);
    workflows::update(&ctx, &prog, None, UpdateFlags::default(), true).unwrap();

    assert_eq!(head(&prog.join("lib")), lib2);
    assert_eq!(read(&prog.join("lib/lib.c")), "int v2;\n");
}

#[test]
fn test_publish_pushes_children_before_parent() {
    let Some(world) = GitWorld::new() else { return };
    let lib1 = world.create("lib", &[("lib.c", "int v1;\n")]);
    world.create(
        "prog",
        &[
            ("main.c", "int main;\n"),
            ("lib.lib", world.pointer("lib", &lib1).as_str()),
        ],
    );
    let prog = workflows::import(&Context::new(world.work()), &world.url("prog"), None).unwrap();
    let lib = prog.join("lib");

    fs::write(lib.join("lib.c"), "int v2;\n").unwrap();
    git(&lib, &["commit", "-q", "-a", "-m", "Local change"]);
    let lib2 = head(&lib);
    configure_identity(&prog);

    let ctx = Context::new(&prog);
    let prompt = FixedMessage("unused".to_string());
    workflows::publish(&ctx, &prog, false, Some("Update lib"), &prompt, true).unwrap();

    assert_eq!(world.upstream_head("lib"), lib2);
    assert_eq!(
        world.upstream_file("prog", "lib.lib"),
        world.pointer("lib", &lib2).trim_end()
    );
    assert_eq!(world.upstream_head("prog"), head(&prog));
}

#[test]
fn test_status_lists_dirty_checkouts() {
    let Some(world) = GitWorld::new() else { return };
    let lib = world.create("lib", &[("lib.c", "int lib;\n")]);
    world.create(
        "prog",
        &[
            ("main.c", "int main;\n"),
            ("lib.lib", world.pointer("lib", &lib).as_str()),
        ],
    );
    let prog = workflows::import(&Context::new(world.work()), &world.url("prog"), None).unwrap();
    let ctx = Context::new(&prog);
    assert!(workflows::status(&ctx, &prog).unwrap().is_empty());

    fs::write(prog.join("lib/lib.c"), "int edited;\n").unwrap();
    let dirty = workflows::status(&ctx, &prog).unwrap();
    assert_eq!(dirty.len(), 1);
    assert_eq!(dirty[0].name, "lib");
    assert!(dirty[0].status.contains("lib.c"));
}
