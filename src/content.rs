//! Blogs, CTFs, writeups, hall of fame and the leaderboard

use chrono::Utc;
use rusqlite::{params, Row, ToSql};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::discovery::LocalArticles;
use crate::error::{GatewayError, GatewayResult, OptionalRow, NO_ROWS};
use crate::models::{
    Article, Blog, BlogUpdate, Ctf, CtfUpdate, Difficulty, HallOfFameEntry, HallOfFameUpdate,
    LeaderboardEntry, NewBlog, NewCtf, NewHallOfFameEntry, NewWriteup, Writeup, WriteupUpdate,
};
use crate::store::{date, now, parsed, string_list, CatalogStore};

const BLOG_COLUMNS: &str =
    "id, title, author_id, date, content, excerpt, tags, likes, comments, thumbnail";
const CTF_COLUMNS: &str =
    "id, title, description, difficulty, category, creator_id, rating, players, tags";
const WRITEUP_COLUMNS: &str =
    "id, title, author_id, date, content, category, difficulty, likes, ctf_id";
const HALL_OF_FAME_SELECT: &str = "SELECT h.id, h.user_id, h.bug_title, h.reward, h.date, \
    h.report_id, u.username, u.avatar FROM hall_of_fame h LEFT JOIN users u ON u.id = h.user_id";

type RowMapper<T> = fn(&Row) -> rusqlite::Result<T>;

fn no_such(kind: &str, id: &str) -> GatewayError {
    GatewayError::new(NO_ROWS, format!("no {} {}", kind, id))
}

impl CatalogStore {
    fn select_all<T>(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        map: RowMapper<T>,
    ) -> GatewayResult<Vec<T>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, map)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn select_one<T>(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        map: RowMapper<T>,
    ) -> GatewayResult<Option<T>> {
        let conn = self.conn();
        conn.query_row(sql, params, map)
            .map_err(GatewayError::from)
            .optional_row()
    }

    fn execute(&self, sql: &str, params: &[&dyn ToSql]) -> GatewayResult<usize> {
        Ok(self.conn().execute(sql, params)?)
    }

    // ========================================================================
    // BLOGS
    // ========================================================================

    pub fn list_blogs(&self) -> GatewayResult<Vec<Blog>> {
        self.select_all(
            &format!("SELECT {} FROM blogs ORDER BY created_at DESC, rowid DESC", BLOG_COLUMNS),
            params![],
            blog_from_row,
        )
    }

    pub fn blog_by_id(&self, id: &str) -> GatewayResult<Option<Blog>> {
        self.select_one(
            &format!("SELECT {} FROM blogs WHERE id = ?1", BLOG_COLUMNS),
            params![id],
            blog_from_row,
        )
    }

    pub fn create_blog(&self, new: NewBlog) -> GatewayResult<Blog> {
        let blog = Blog {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            author_id: new.author_id,
            date: Utc::now().date_naive(),
            content: new.content,
            excerpt: new.excerpt,
            tags: new.tags,
            likes: 0,
            comments: 0,
            thumbnail: new.thumbnail,
        };
        self.insert_blog(&blog)?;
        Ok(blog)
    }

    pub fn insert_blog(&self, blog: &Blog) -> GatewayResult<()> {
        self.execute(
            &format!(
                "INSERT OR REPLACE INTO blogs ({}, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                BLOG_COLUMNS
            ),
            params![
                blog.id,
                blog.title,
                blog.author_id,
                blog.date.to_string(),
                blog.content,
                blog.excerpt,
                serde_json::to_string(&blog.tags)?,
                blog.likes,
                blog.comments,
                blog.thumbnail,
                now(),
            ],
        )?;
        debug!("Stored blog {}", blog.id);
        Ok(())
    }

    pub fn update_blog(&self, id: &str, update: BlogUpdate) -> GatewayResult<Blog> {
        let tags = update.tags.as_ref().map(serde_json::to_string).transpose()?;
        let changed = self.execute(
            "UPDATE blogs SET
                title = COALESCE(?2, title),
                content = COALESCE(?3, content),
                excerpt = COALESCE(?4, excerpt),
                tags = COALESCE(?5, tags),
                thumbnail = COALESCE(?6, thumbnail)
             WHERE id = ?1",
            params![id, update.title, update.content, update.excerpt, tags, update.thumbnail],
        )?;
        if changed == 0 {
            return Err(no_such("blog", id));
        }
        self.blog_by_id(id)?.ok_or_else(|| no_such("blog", id))
    }

    pub fn delete_blog(&self, id: &str) -> GatewayResult<bool> {
        Ok(self.execute("DELETE FROM blogs WHERE id = ?1", params![id])? > 0)
    }

    /// Title, excerpt or content contains `query`
    pub fn search_blogs(&self, query: &str) -> GatewayResult<Vec<Blog>> {
        self.select_all(
            &format!(
                "SELECT {} FROM blogs
                 WHERE title LIKE '%' || ?1 || '%'
                    OR excerpt LIKE '%' || ?1 || '%'
                    OR content LIKE '%' || ?1 || '%'
                 ORDER BY created_at DESC, rowid DESC",
                BLOG_COLUMNS
            ),
            params![query],
            blog_from_row,
        )
    }

    pub fn blogs_by_author(&self, author_id: &str) -> GatewayResult<Vec<Blog>> {
        self.select_all(
            &format!(
                "SELECT {} FROM blogs WHERE author_id = ?1 ORDER BY created_at DESC, rowid DESC",
                BLOG_COLUMNS
            ),
            params![author_id],
            blog_from_row,
        )
    }

    // ========================================================================
    // CTFS
    // ========================================================================

    pub fn list_ctfs(&self) -> GatewayResult<Vec<Ctf>> {
        self.select_all(
            &format!("SELECT {} FROM ctfs ORDER BY created_at DESC, rowid DESC", CTF_COLUMNS),
            params![],
            ctf_from_row,
        )
    }

    pub fn ctf_by_id(&self, id: &str) -> GatewayResult<Option<Ctf>> {
        self.select_one(
            &format!("SELECT {} FROM ctfs WHERE id = ?1", CTF_COLUMNS),
            params![id],
            ctf_from_row,
        )
    }

    pub fn create_ctf(&self, new: NewCtf) -> GatewayResult<Ctf> {
        let ctf = Ctf {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            description: new.description,
            difficulty: new.difficulty,
            category: new.category,
            creator_id: new.creator_id,
            rating: 0.0,
            players: 0,
            tags: new.tags,
        };
        self.insert_ctf(&ctf)?;
        Ok(ctf)
    }

    pub fn insert_ctf(&self, ctf: &Ctf) -> GatewayResult<()> {
        self.execute(
            &format!(
                "INSERT OR REPLACE INTO ctfs ({}, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                CTF_COLUMNS
            ),
            params![
                ctf.id,
                ctf.title,
                ctf.description,
                ctf.difficulty.to_string(),
                ctf.category,
                ctf.creator_id,
                ctf.rating,
                ctf.players,
                serde_json::to_string(&ctf.tags)?,
                now(),
            ],
        )?;
        Ok(())
    }

    pub fn update_ctf(&self, id: &str, update: CtfUpdate) -> GatewayResult<Ctf> {
        let tags = update.tags.as_ref().map(serde_json::to_string).transpose()?;
        let changed = self.execute(
            "UPDATE ctfs SET
                title = COALESCE(?2, title),
                description = COALESCE(?3, description),
                difficulty = COALESCE(?4, difficulty),
                category = COALESCE(?5, category),
                rating = COALESCE(?6, rating),
                tags = COALESCE(?7, tags)
             WHERE id = ?1",
            params![
                id,
                update.title,
                update.description,
                update.difficulty.map(|d| d.to_string()),
                update.category,
                update.rating,
                tags,
            ],
        )?;
        if changed == 0 {
            return Err(no_such("ctf", id));
        }
        self.ctf_by_id(id)?.ok_or_else(|| no_such("ctf", id))
    }

    pub fn delete_ctf(&self, id: &str) -> GatewayResult<bool> {
        Ok(self.execute("DELETE FROM ctfs WHERE id = ?1", params![id])? > 0)
    }

    pub fn ctfs_by_category(&self, category: &str) -> GatewayResult<Vec<Ctf>> {
        self.select_all(
            &format!(
                "SELECT {} FROM ctfs WHERE category = ?1 ORDER BY created_at DESC, rowid DESC",
                CTF_COLUMNS
            ),
            params![category],
            ctf_from_row,
        )
    }

    pub fn ctfs_by_difficulty(&self, difficulty: Difficulty) -> GatewayResult<Vec<Ctf>> {
        self.select_all(
            &format!(
                "SELECT {} FROM ctfs WHERE difficulty = ?1 ORDER BY created_at DESC, rowid DESC",
                CTF_COLUMNS
            ),
            params![difficulty.to_string()],
            ctf_from_row,
        )
    }

    pub fn search_ctfs(&self, query: &str) -> GatewayResult<Vec<Ctf>> {
        self.select_all(
            &format!(
                "SELECT {} FROM ctfs
                 WHERE title LIKE '%' || ?1 || '%'
                    OR description LIKE '%' || ?1 || '%'
                    OR category LIKE '%' || ?1 || '%'
                 ORDER BY created_at DESC, rowid DESC",
                CTF_COLUMNS
            ),
            params![query],
            ctf_from_row,
        )
    }

    /// Count one more player; a missing CTF is a no-rows error
    pub fn increment_players(&self, id: &str) -> GatewayResult<u32> {
        let changed = self.execute(
            "UPDATE ctfs SET players = players + 1 WHERE id = ?1",
            params![id],
        )?;
        if changed == 0 {
            return Err(no_such("ctf", id));
        }
        self.ctf_by_id(id)?
            .map(|c| c.players)
            .ok_or_else(|| no_such("ctf", id))
    }

    // ========================================================================
    // WRITEUPS
    // ========================================================================

    pub fn list_writeups(&self) -> GatewayResult<Vec<Writeup>> {
        self.select_all(
            &format!(
                "SELECT {} FROM writeups ORDER BY created_at DESC, rowid DESC",
                WRITEUP_COLUMNS
            ),
            params![],
            writeup_from_row,
        )
    }

    pub fn writeup_by_id(&self, id: &str) -> GatewayResult<Option<Writeup>> {
        self.select_one(
            &format!("SELECT {} FROM writeups WHERE id = ?1", WRITEUP_COLUMNS),
            params![id],
            writeup_from_row,
        )
    }

    pub fn create_writeup(&self, new: NewWriteup) -> GatewayResult<Writeup> {
        let writeup = Writeup {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            author_id: new.author_id,
            date: Utc::now().date_naive(),
            content: new.content,
            category: new.category,
            difficulty: new.difficulty,
            likes: 0,
            ctf_id: new.ctf_id,
        };
        self.execute(
            &format!(
                "INSERT INTO writeups ({}, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                WRITEUP_COLUMNS
            ),
            params![
                writeup.id,
                writeup.title,
                writeup.author_id,
                writeup.date.to_string(),
                writeup.content,
                writeup.category,
                writeup.difficulty.to_string(),
                writeup.likes,
                writeup.ctf_id,
                now(),
            ],
        )?;
        Ok(writeup)
    }

    pub fn update_writeup(&self, id: &str, update: WriteupUpdate) -> GatewayResult<Writeup> {
        let changed = self.execute(
            "UPDATE writeups SET
                title = COALESCE(?2, title),
                content = COALESCE(?3, content),
                category = COALESCE(?4, category),
                difficulty = COALESCE(?5, difficulty)
             WHERE id = ?1",
            params![
                id,
                update.title,
                update.content,
                update.category,
                update.difficulty.map(|d| d.to_string()),
            ],
        )?;
        if changed == 0 {
            return Err(no_such("writeup", id));
        }
        self.writeup_by_id(id)?.ok_or_else(|| no_such("writeup", id))
    }

    pub fn delete_writeup(&self, id: &str) -> GatewayResult<bool> {
        Ok(self.execute("DELETE FROM writeups WHERE id = ?1", params![id])? > 0)
    }

    pub fn writeups_by_author(&self, author_id: &str) -> GatewayResult<Vec<Writeup>> {
        self.writeups_where("author_id = ?1", author_id)
    }

    pub fn writeups_by_category(&self, category: &str) -> GatewayResult<Vec<Writeup>> {
        self.writeups_where("category = ?1", category)
    }

    pub fn writeups_by_ctf(&self, ctf_id: &str) -> GatewayResult<Vec<Writeup>> {
        self.writeups_where("ctf_id = ?1", ctf_id)
    }

    pub fn search_writeups(&self, query: &str) -> GatewayResult<Vec<Writeup>> {
        self.writeups_where(
            "title LIKE '%' || ?1 || '%'
                OR content LIKE '%' || ?1 || '%'
                OR category LIKE '%' || ?1 || '%'",
            query,
        )
    }

    fn writeups_where(&self, condition: &str, value: &str) -> GatewayResult<Vec<Writeup>> {
        self.select_all(
            &format!(
                "SELECT {} FROM writeups WHERE {} ORDER BY created_at DESC, rowid DESC",
                WRITEUP_COLUMNS, condition
            ),
            params![value],
            writeup_from_row,
        )
    }

    // ========================================================================
    // HALL OF FAME
    // ========================================================================

    pub fn list_hall_of_fame(&self) -> GatewayResult<Vec<HallOfFameEntry>> {
        self.select_all(
            &format!(
                "{} ORDER BY h.created_at DESC, h.rowid DESC",
                HALL_OF_FAME_SELECT
            ),
            params![],
            hall_of_fame_from_row,
        )
    }

    pub fn hall_of_fame_by_id(&self, id: &str) -> GatewayResult<Option<HallOfFameEntry>> {
        self.select_one(
            &format!("{} WHERE h.id = ?1", HALL_OF_FAME_SELECT),
            params![id],
            hall_of_fame_from_row,
        )
    }

    pub fn create_hall_of_fame(&self, new: NewHallOfFameEntry) -> GatewayResult<HallOfFameEntry> {
        let id = Uuid::new_v4().to_string();
        let date = new.date.unwrap_or_else(|| Utc::now().date_naive());
        self.execute(
            "INSERT INTO hall_of_fame (id, user_id, bug_title, reward, date, report_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                new.user_id,
                new.bug_title,
                new.reward,
                date.to_string(),
                new.report_id,
                now(),
            ],
        )?;
        info!("Credited {} in the hall of fame", new.user_id);
        self.hall_of_fame_by_id(&id)?
            .ok_or_else(|| no_such("hall of fame entry", &id))
    }

    pub fn update_hall_of_fame(
        &self,
        id: &str,
        update: HallOfFameUpdate,
    ) -> GatewayResult<HallOfFameEntry> {
        let changed = self.execute(
            "UPDATE hall_of_fame SET
                bug_title = COALESCE(?2, bug_title),
                reward = COALESCE(?3, reward),
                date = COALESCE(?4, date),
                report_id = COALESCE(?5, report_id)
             WHERE id = ?1",
            params![
                id,
                update.bug_title,
                update.reward,
                update.date.map(|d| d.to_string()),
                update.report_id,
            ],
        )?;
        if changed == 0 {
            return Err(no_such("hall of fame entry", id));
        }
        self.hall_of_fame_by_id(id)?
            .ok_or_else(|| no_such("hall of fame entry", id))
    }

    pub fn delete_hall_of_fame(&self, id: &str) -> GatewayResult<bool> {
        Ok(self.execute("DELETE FROM hall_of_fame WHERE id = ?1", params![id])? > 0)
    }

    pub fn hall_of_fame_by_user(&self, user_id: &str) -> GatewayResult<Vec<HallOfFameEntry>> {
        self.select_all(
            &format!(
                "{} WHERE h.user_id = ?1 ORDER BY h.created_at DESC, h.rowid DESC",
                HALL_OF_FAME_SELECT
            ),
            params![user_id],
            hall_of_fame_from_row,
        )
    }

    // ========================================================================
    // LEADERBOARD
    // ========================================================================

    /// Top `limit` entries by xp
    pub fn leaderboard(&self, limit: usize) -> GatewayResult<Vec<LeaderboardEntry>> {
        self.select_all(
            "SELECT user_id, xp, completed_rooms, rank FROM leaderboard
             ORDER BY xp DESC, rowid ASC LIMIT ?1",
            params![limit as i64],
            |row| {
                Ok(LeaderboardEntry {
                    user_id: row.get(0)?,
                    xp: row.get(1)?,
                    completed_rooms: row.get(2)?,
                    rank: row.get(3)?,
                })
            },
        )
    }

    pub fn user_rank(&self, user_id: &str) -> GatewayResult<Option<i64>> {
        self.select_one(
            "SELECT rank FROM leaderboard WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
    }

    /// Set a user's xp, then re-rank everyone
    pub fn update_xp(&self, user_id: &str, xp: i64) -> GatewayResult<()> {
        let changed = self.execute(
            "UPDATE leaderboard SET xp = ?2, updated_at = ?3 WHERE user_id = ?1",
            params![user_id, xp, now()],
        )?;
        if changed == 0 {
            return Err(no_such("leaderboard entry", user_id));
        }
        self.recalculate_ranks()
    }

    /// No-op for users without a leaderboard entry
    pub fn increment_completed_rooms(&self, user_id: &str) -> GatewayResult<()> {
        let changed = self.execute(
            "UPDATE leaderboard SET completed_rooms = completed_rooms + 1, updated_at = ?2
             WHERE user_id = ?1",
            params![user_id, now()],
        )?;
        if changed == 0 {
            debug!("No leaderboard entry for {}", user_id);
        }
        Ok(())
    }

    /// Rank 1 is the highest xp; ties keep insertion order
    pub fn recalculate_ranks(&self) -> GatewayResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let ids: Vec<String> = {
            let mut stmt =
                tx.prepare("SELECT user_id FROM leaderboard ORDER BY xp DESC, rowid ASC")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?;
            ids
        };

        for (index, user_id) in ids.iter().enumerate() {
            tx.execute(
                "UPDATE leaderboard SET rank = ?2 WHERE user_id = ?1",
                params![user_id, index as i64 + 1],
            )?;
        }
        tx.commit()?;

        info!("Recalculated ranks for {} users", ids.len());
        Ok(())
    }
}

impl LocalArticles for CatalogStore {
    fn local_article(&self, id: &str) -> Option<Article> {
        let blog = match self.blog_by_id(id) {
            Ok(found) => found?,
            Err(e) => {
                warn!("Local blog {} lookup failed: {}", id, e);
                return None;
            }
        };

        let (author, avatar) = match self.user_by_id(&blog.author_id) {
            Ok(Some(user)) => (user.username, user.avatar.unwrap_or_default()),
            _ => ("Unknown".to_string(), String::new()),
        };
        Some(blog.to_article(&author, &avatar))
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn blog_from_row(row: &Row) -> rusqlite::Result<Blog> {
    Ok(Blog {
        id: row.get(0)?,
        title: row.get(1)?,
        author_id: row.get(2)?,
        date: date(row, 3)?,
        content: row.get(4)?,
        excerpt: row.get(5)?,
        tags: string_list(row, 6)?,
        likes: row.get(7)?,
        comments: row.get(8)?,
        thumbnail: row.get(9)?,
    })
}

fn ctf_from_row(row: &Row) -> rusqlite::Result<Ctf> {
    Ok(Ctf {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        difficulty: parsed(row, 3)?,
        category: row.get(4)?,
        creator_id: row.get(5)?,
        rating: row.get(6)?,
        players: row.get(7)?,
        tags: string_list(row, 8)?,
    })
}

fn writeup_from_row(row: &Row) -> rusqlite::Result<Writeup> {
    Ok(Writeup {
        id: row.get(0)?,
        title: row.get(1)?,
        author_id: row.get(2)?,
        date: date(row, 3)?,
        content: row.get(4)?,
        category: row.get(5)?,
        difficulty: parsed(row, 6)?,
        likes: row.get(7)?,
        ctf_id: row.get(8)?,
    })
}

fn hall_of_fame_from_row(row: &Row) -> rusqlite::Result<HallOfFameEntry> {
    Ok(HallOfFameEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        bug_title: row.get(2)?,
        reward: row.get(3)?,
        date: date(row, 4)?,
        report_id: row.get(5)?,
        username: row.get(6)?,
        avatar: row.get(7)?,
    })
}
