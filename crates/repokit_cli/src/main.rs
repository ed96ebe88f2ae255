//! CLI smoke entry point.
//!
//! # Responsibility
//! - Exercise `repokit_core` end to end against an in-memory database.
//! - Keep output deterministic for quick local sanity checks.
//!
//! Set `REPOKIT_LOG_DIR` (absolute path) to also write repository logs.

use repokit_core::db::{open_db_in_memory, Migration};
use repokit_core::{
    default_log_level, init_logging, AttributeMap, Attributes, Conditions, Entity, EntityId,
    EntitySchema, PageRequest, Record, Relations, RepoResult, Repository, SqliteBackend,
    SqliteRepository, Timestamps,
};
use std::error::Error;

const DEMO_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: "CREATE TABLE tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        done INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER,
        updated_at INTEGER
    );",
}];

struct Task {
    id: EntityId,
    title: String,
    done: bool,
}

impl Attributes for Task {
    fn to_map(&self) -> AttributeMap {
        AttributeMap::new()
            .with("title", self.title.as_str())
            .with("done", self.done)
    }
}

impl Entity for Task {
    const SCHEMA: EntitySchema = EntitySchema {
        table: "tasks",
        columns: &["title", "done"],
        timestamps: Some(Timestamps::DEFAULT),
        relations: &[],
    };

    fn id(&self) -> EntityId {
        self.id
    }

    fn from_record(record: &Record) -> RepoResult<Self> {
        Ok(Self {
            id: record.id()?,
            title: record.text("title")?,
            done: record.boolean("done")?,
        })
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    if let Ok(log_dir) = std::env::var("REPOKIT_LOG_DIR") {
        init_logging(default_log_level(), &log_dir)?;
    }

    let conn = open_db_in_memory(DEMO_MIGRATIONS)?;
    let tasks = SqliteRepository::<Task>::try_new(SqliteBackend::new(&conn))?;

    let titles = ["write docs", "review patch", "ship release"];
    let rows = titles
        .iter()
        .map(|title| AttributeMap::new().with("title", *title))
        .collect::<Vec<_>>();
    tasks.batch_insert(&rows)?;

    let docs = Conditions::new().eq("title", "write docs");
    let first = tasks.first_or_fail(Some(&docs), &Relations::none())?;
    tasks.update(first.id, &AttributeMap::new().with("done", true))?;

    let open_count = tasks.count(Some(&Conditions::new().eq("done", false)))?;
    let page = tasks.paginate(None, &Relations::none(), PageRequest::new(1, Some(2)), None)?;

    println!("repokit_core version={}", repokit_core::core_version());
    println!("tasks total={} open={}", page.total, open_count);
    for task in &page.items {
        println!("task id={} done={} title={}", task.id, task.done, task.title);
    }
    println!(
        "page current={} last={} more={}",
        page.current_page,
        page.last_page(),
        page.has_more_pages()
    );
    Ok(())
}
