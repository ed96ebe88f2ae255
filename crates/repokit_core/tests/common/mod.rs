#![allow(dead_code)]

use repokit_core::db::{open_db_in_memory, Migration};
use repokit_core::{
    AttributeMap, Attributes, Clock, Entity, EntityId, EntitySchema, Field, Record, RelationDef,
    RepoResult, Timestamps,
};
use rusqlite::Connection;
use std::sync::atomic::{AtomicI64, Ordering};

pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("schema.sql"),
}];

pub fn open() -> Connection {
    open_db_in_memory(MIGRATIONS).unwrap()
}

/// Clock that moves forward by one millisecond on every read.
pub struct TickingClock(AtomicI64);

impl TickingClock {
    pub fn starting_at(now_ms: i64) -> Self {
        Self(AtomicI64::new(now_ms))
    }
}

impl Clock for TickingClock {
    fn now_ms(&self) -> i64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Author {
    pub id: EntityId,
    pub name: String,
}

impl Attributes for Author {
    fn to_map(&self) -> AttributeMap {
        AttributeMap::new().with("name", self.name.as_str())
    }
}

impl Entity for Author {
    const SCHEMA: EntitySchema = EntitySchema {
        table: "authors",
        columns: &["name"],
        timestamps: None,
        relations: &[RelationDef::has_many("articles", "articles", "author_id")],
    };

    fn id(&self) -> EntityId {
        self.id
    }

    fn from_record(record: &Record) -> RepoResult<Self> {
        Ok(Self {
            id: record.id()?,
            name: record.text("name")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: EntityId,
    pub article_id: EntityId,
    pub body: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Attributes for Comment {
    fn to_map(&self) -> AttributeMap {
        AttributeMap::new()
            .with("article_id", self.article_id)
            .with("body", self.body.as_str())
    }
}

impl Entity for Comment {
    const SCHEMA: EntitySchema = EntitySchema {
        table: "comments",
        columns: &["article_id", "body"],
        timestamps: Some(Timestamps::DEFAULT),
        relations: &[RelationDef::belongs_to("article", "articles", "article_id")],
    };

    fn id(&self) -> EntityId {
        self.id
    }

    fn from_record(record: &Record) -> RepoResult<Self> {
        Ok(Self {
            id: record.id()?,
            article_id: record.integer("article_id")?,
            body: record.text("body")?,
            created_at: record.integer("created_at")?,
            updated_at: record.integer("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: EntityId,
    pub name: String,
    pub score: i64,
    pub summary: Option<String>,
    pub author_id: Option<EntityId>,
    pub created_at: i64,
    pub updated_at: i64,
    /// Loaded only when the `author` relation was requested.
    pub author: Option<Author>,
    /// `None` unless the `comments` relation was requested.
    pub comments: Option<Vec<Comment>>,
}

impl Attributes for Article {
    fn to_map(&self) -> AttributeMap {
        AttributeMap::new()
            .with("name", self.name.as_str())
            .with("score", self.score)
            .with("summary", self.summary.clone())
            .with("author_id", self.author_id)
    }
}

impl Entity for Article {
    const SCHEMA: EntitySchema = EntitySchema {
        table: "articles",
        columns: &["name", "score", "summary", "author_id"],
        timestamps: Some(Timestamps::DEFAULT),
        relations: &[
            RelationDef::belongs_to("author", "authors", "author_id"),
            RelationDef::has_many("comments", "comments", "article_id"),
        ],
    };

    fn id(&self) -> EntityId {
        self.id
    }

    fn from_record(record: &Record) -> RepoResult<Self> {
        let author = record
            .related_one("author")
            .map(Author::from_record)
            .transpose()?;
        let comments = record
            .related("comments")
            .map(|rows| rows.iter().map(Comment::from_record).collect::<RepoResult<Vec<_>>>())
            .transpose()?;

        Ok(Self {
            id: record.id()?,
            name: record.text("name")?,
            score: record.integer("score")?,
            summary: record.opt_text("summary")?,
            author_id: record.opt_integer("author_id")?,
            created_at: record.integer("created_at")?,
            updated_at: record.integer("updated_at")?,
            author,
            comments,
        })
    }
}

/// Partial article payload; omitted fields are not written.
#[derive(Debug, Clone, Default)]
pub struct ArticlePatch {
    pub name: Field<String>,
    pub score: Field<i64>,
    pub summary: Field<Option<String>>,
    pub author_id: Field<Option<EntityId>>,
}

impl ArticlePatch {
    pub fn named(name: &str) -> Self {
        Self {
            name: Field::Set(name.to_string()),
            ..Self::default()
        }
    }

    pub fn with_score(mut self, score: i64) -> Self {
        self.score = Field::Set(score);
        self
    }

    pub fn with_summary(mut self, summary: Option<&str>) -> Self {
        self.summary = Field::Set(summary.map(str::to_string));
        self
    }

    pub fn with_author(mut self, author_id: EntityId) -> Self {
        self.author_id = Field::Set(Some(author_id));
        self
    }
}

impl Attributes for ArticlePatch {
    fn to_map(&self) -> AttributeMap {
        let mut map = AttributeMap::new();
        self.name.write_to(&mut map, "name");
        self.score.write_to(&mut map, "score");
        self.summary.write_to(&mut map, "summary");
        self.author_id.write_to(&mut map, "author_id");
        map
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub id: EntityId,
    pub name: String,
    pub color: Option<String>,
}

impl Attributes for Label {
    fn to_map(&self) -> AttributeMap {
        AttributeMap::new()
            .with("name", self.name.as_str())
            .with("color", self.color.clone())
    }
}

impl Entity for Label {
    const SCHEMA: EntitySchema = EntitySchema {
        table: "labels",
        columns: &["name", "color"],
        timestamps: None,
        relations: &[],
    };

    fn id(&self) -> EntityId {
        self.id
    }

    fn from_record(record: &Record) -> RepoResult<Self> {
        Ok(Self {
            id: record.id()?,
            name: record.text("name")?,
            color: record.opt_text("color")?,
        })
    }
}

pub fn label(name: &str) -> AttributeMap {
    AttributeMap::new().with("name", name)
}
