// SPDX-License-Identifier: MPL-2.0

/// SQL schema for the community store
pub const SCHEMA: &str = r#"
-- Database version for migrations
PRAGMA user_version = 1;

-- mirror_posts: denormalized copies of shared origin posts.
-- site_id is the community site hosting the copy.
CREATE TABLE IF NOT EXISTS mirror_posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL,
    origin_site_id INTEGER NOT NULL,
    origin_post_id INTEGER NOT NULL,
    post_type TEXT NOT NULL,
    status TEXT NOT NULL,
    author_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    content TEXT NOT NULL DEFAULT '',
    excerpt TEXT NOT NULL DEFAULT '',
    post_date TEXT NOT NULL,
    post_date_gmt TEXT,
    post_modified TEXT NOT NULL,
    post_modified_gmt TEXT,
    UNIQUE(site_id, origin_site_id, origin_post_id)
);

CREATE INDEX IF NOT EXISTS idx_mirror_posts_modified
    ON mirror_posts(site_id, post_modified_gmt, post_modified);

-- mirror_meta: key/value metadata attached to mirror posts
CREATE TABLE IF NOT EXISTS mirror_meta (
    mirror_id INTEGER NOT NULL REFERENCES mirror_posts(id) ON DELETE CASCADE,
    meta_key TEXT NOT NULL,
    meta_value TEXT NOT NULL,
    PRIMARY KEY (mirror_id, meta_key)
);

CREATE INDEX IF NOT EXISTS idx_mirror_meta_key ON mirror_meta(meta_key, meta_value);

-- sites_search: flat directory of member sites
CREATE TABLE IF NOT EXISTS sites_search (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    blog_id INTEGER NOT NULL,
    blog_name TEXT,
    blog_desc TEXT,
    blog_url TEXT,
    blog_personal INTEGER NOT NULL DEFAULT 0,
    semester INTEGER
);

CREATE INDEX IF NOT EXISTS idx_sites_search_blog_id ON sites_search(blog_id);
"#;
