//! Fixture builders shared by the scanner, planner and execution tests.
//!
//! The standard tree mirrors a realistic base folder: an `up_down`
//! schema folder across four versions, a `change` data folder, an
//! `up_down` perf folder, and snapshots for three batches.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use crate::config::Config;

/// Writes `content` to `base/rel`, creating parent directories.
pub(crate) fn write_file(base: &Path, rel: &str, content: &str) {
    let path = base.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("fixture directory");
    }
    fs::write(&path, content).expect("fixture file");
}

/// Configuration matching [`standard_tree`]: schema (`up_down`), data
/// (`change`, explicit labels), perf (`up_down`, derived labels), the
/// `seed` and `perf-seed` batches, and one allowed command.
pub(crate) fn standard_config() -> Config {
    // perf declares no labels, so they derive to
    // GraphToolMigration:PerfVersion.
    Config::from_toml_str(
        r#"
        [planner]
        base_folder = "import"

        [planner.allowed_commands]
        graph-tool = "/app/graph-tool"

        [planner.folders.data]
        migration_type = "change"
        node_labels = ["DataVersion"]

        [planner.folders.perf]
        migration_type = "up_down"

        [planner.batches.seed]
        folders = ["data"]

        [planner.batches.perf-seed]
        folders = ["data", "perf"]
        "#,
    )
    .expect("standard fixture config")
}

/// Builds the standard on-disk fixture tree in a fresh temp directory.
pub(crate) fn standard_tree() -> TempDir {
    let tree = TempDir::new().expect("fixture temp dir");
    let base = tree.path();

    // v1.0.0
    write_file(base, "schema/v1.0.0/1000_up_core.cypher", "return 1;\n");
    write_file(base, "schema/v1.0.0/1000_down_core.cypher", "return 1;\n");
    write_file(
        base,
        "schema/v1.0.0/2000_up_test_cmd.run",
        "// bootstrap helper data\ngraph-tool seed core\n",
    );
    write_file(base, "schema/v1.0.0/2000_down_test_cmd.cypher", "return 1;\n");
    write_file(base, "data/v1.0.0/1400_test.cypher", "return 1;\n");

    // v1.0.1
    write_file(base, "schema/v1.0.1/1200_up_plan.cypher", "return 1;\n");
    write_file(base, "schema/v1.0.1/1200_down_plan.cypher", "return 1;\n");
    write_file(base, "schema/v1.0.1/1500_up_contract.cypher", "return 1;\n");
    write_file(
        base,
        "schema/v1.0.1/1500_down_contract.run",
        "graph-tool drop contracts\n",
    );
    write_file(base, "data/v1.0.1/1300_plans.cypher", "return 1;\n");
    write_file(base, "data/v1.0.1/1400_contracts.cypher", "return 1;\n");
    write_file(
        base,
        "data/v1.0.1/4800_test_cmd.run",
        "graph-tool seed contracts\n",
    );
    write_file(base, "perf/v1.0.1/1350_up_plansx1000.cypher", "return 1;\n");
    write_file(base, "perf/v1.0.1/1350_down_plansx1000.cypher", "return 1;\n");
    write_file(base, "perf/v1.0.1/2800_up_contracts_2000.cypher", "return 1;\n");
    write_file(base, "perf/v1.0.1/2800_down_contracts_2000.cypher", "return 1;\n");

    // v1.0.2
    write_file(base, "schema/v1.0.2/1850_up_plan.cypher", "return 1;\n");
    write_file(base, "schema/v1.0.2/1850_down_plan.cypher", "return 1;\n");
    write_file(base, "schema/v1.0.2/2100_up_session.cypher", "return 1;\n");
    write_file(base, "schema/v1.0.2/2100_down_session.cypher", "return 1;\n");
    write_file(base, "schema/v1.0.2/2200_up_test.cypher", "return 1;\n");
    write_file(base, "schema/v1.0.2/2200_down_test.cypher", "return 1;\n");
    write_file(base, "perf/v1.0.2/2010_up_p100.cypher", "return 1;\n");
    write_file(base, "perf/v1.0.2/2010_down_p100.cypher", "return 1;\n");
    write_file(base, "perf/v1.0.2/2500_up_test_cmd.run", "graph-tool seed p100\n");
    write_file(base, "perf/v1.0.2/2500_down_test_cmd.run", "exit\n");

    // v1.0.3 stays in the catalog through the marker alone.
    write_file(base, "schema/v1.0.3/.keep_version_folder", "");

    // Snapshots
    write_file(base, "snapshots/schema_v1.0.0.cypher", "return 1;\n");
    write_file(
        base,
        "snapshots/seed_v1.0.0.run",
        "graph-tool load-snapshot seed\n",
    );
    write_file(base, "snapshots/perf-seed_v1.0.2.cypher", "return 1;\n");

    tree
}
