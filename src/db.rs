use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("enrolld.sqlite3");
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            subject TEXT,
            email TEXT,
            phone TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_teachers_name ON teachers(name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            birth_date TEXT,
            email TEXT,
            phone TEXT,
            parent_name TEXT,
            address TEXT,
            gender TEXT,
            religion TEXT,
            church TEXT,
            korean_level INTEGER,
            korean_level_confirmed INTEGER NOT NULL DEFAULT 0,
            grade INTEGER,
            created_at TEXT,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_name ON students(name)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            year INTEGER,
            term TEXT,
            teacher_id INTEGER,
            min_grade INTEGER,
            max_grade INTEGER,
            max_students INTEGER,
            period INTEGER,
            fee REAL,
            mandatory INTEGER NOT NULL DEFAULT 0,
            enrolled_number INTEGER NOT NULL DEFAULT 0,
            min_korean_level INTEGER NOT NULL DEFAULT 1,
            max_korean_level INTEGER NOT NULL DEFAULT 12,
            display_order INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_name ON classes(name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_year_term ON classes(year, term)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id INTEGER NOT NULL,
            class_id INTEGER NOT NULL,
            comment TEXT,
            status TEXT,
            year INTEGER,
            term TEXT,
            created_at TEXT,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_student ON enrollments(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_class ON enrollments(class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_year_term ON enrollments(year, term)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedules(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            year INTEGER,
            term TEXT,
            opening_time TEXT,
            closing_time TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS consents(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            content TEXT,
            content_eng TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS requests(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT,
            phone TEXT,
            name TEXT,
            students TEXT,
            message TEXT,
            status TEXT,
            memo TEXT,
            request_time TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_requests_status ON requests(status)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS logs(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL,
            log TEXT NOT NULL,
            action_time TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_logs_email ON logs(email)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_logs_action_time ON logs(action_time)",
        [],
    )?;

    // Stores created before these columns shipped need them added in place.
    ensure_students_parent_name(conn)?;
    ensure_requests_memo(conn)?;

    Ok(())
}

fn ensure_students_parent_name(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "parent_name")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE students ADD COLUMN parent_name TEXT", [])?;
    Ok(())
}

fn ensure_requests_memo(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "requests", "memo")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE requests ADD COLUMN memo TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
