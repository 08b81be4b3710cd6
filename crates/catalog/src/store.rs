use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};

use pb_domain::{Device, Error, LinkState, PollTarget, Point, RemovalReport, Result, StatusPair};

use crate::schema;

const DEVICE_COLUMNS: &str = "device_no, address, heartbeat_point_name, heartbeat_point_id, \
     link_status, liveness_status, point_count, last_checked_at";

/// The persisted record of devices, their points and their status pair.
///
/// Every public operation runs in exactly one SQLite transaction. Writers
/// take `BEGIN IMMEDIATE` so a registration and a concurrent reconciliation
/// of the same device serialize instead of interleaving.
pub struct DeviceCatalog {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl DeviceCatalog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(sql)?;
        conn.busy_timeout(Duration::from_secs(5)).map_err(sql)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(sql)?;
        schema::migrate(&conn).map_err(sql)?;
        tracing::debug!(path = %path.display(), "device catalog opened");
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(sql)?;
        schema::migrate(&conn).map_err(sql)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// `None` for in-memory catalogs.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Writes
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Replace-or-insert the row for `device.device_no`. Points are kept.
    pub fn upsert_device(&self, device: &Device) -> Result<()> {
        self.write(|tx| upsert_device_tx(tx, device))
    }

    /// Insert each `(name, identifier)` pair unless `(device_no, name)`
    /// already exists. Returns how many rows were actually inserted.
    pub fn insert_points_if_absent(
        &self,
        device_no: u32,
        points: &[(String, String)],
    ) -> Result<usize> {
        self.write(|tx| insert_points_tx(tx, device_no, points))
    }

    /// Upsert the device and insert-if-absent its points as one unit.
    pub fn register(&self, device: &Device, points: &[(String, String)]) -> Result<usize> {
        self.write(|tx| {
            upsert_device_tx(tx, device)?;
            insert_points_tx(tx, device.device_no, points)
        })
    }

    /// Overwrite the status pair and check time of one device, returning the
    /// pair it replaced.
    pub fn update_status(
        &self,
        device_no: u32,
        status: StatusPair,
        checked_at: DateTime<Utc>,
    ) -> Result<StatusPair> {
        self.write(|tx| {
            let previous = tx
                .query_row(
                    "SELECT link_status, liveness_status FROM devices WHERE device_no = ?1",
                    params![device_no],
                    |row| Ok(StatusPair::new(link(row, 0)?, link(row, 1)?)),
                )
                .optional()?;
            let Some(previous) = previous else {
                return Ok(None);
            };
            tx.execute(
                "UPDATE devices SET link_status = ?2, liveness_status = ?3, last_checked_at = ?4 \
                 WHERE device_no = ?1",
                params![
                    device_no,
                    status.link.as_str(),
                    status.liveness.as_str(),
                    checked_at
                ],
            )?;
            Ok(Some(previous))
        })?
        .ok_or_else(|| Error::NotFound(format!("device {device_no}")))
    }

    /// Delete the device's points, then the device row.
    pub fn remove_device(&self, device_no: u32) -> Result<RemovalReport> {
        let report = self.write(|tx| {
            let points_removed =
                tx.execute("DELETE FROM points WHERE device_no = ?1", params![device_no])?;
            let devices_removed =
                tx.execute("DELETE FROM devices WHERE device_no = ?1", params![device_no])?;
            Ok(RemovalReport {
                devices_removed,
                points_removed,
            })
        })?;
        if report.is_empty() {
            return Err(Error::NotFound(format!("device {device_no}")));
        }
        Ok(report)
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Reads
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Devices with a heartbeat point, in device-number order.
    pub fn list_devices_with_heartbeat(&self) -> Result<Vec<PollTarget>> {
        self.read(|tx| {
            let mut stmt = tx.prepare(
                "SELECT device_no, address, heartbeat_point_id FROM devices \
                 WHERE heartbeat_point_id <> '' ORDER BY device_no",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(PollTarget {
                    device_no: row.get(0)?,
                    address: row.get(1)?,
                    heartbeat_point_id: row.get(2)?,
                })
            })?;
            rows.collect()
        })
    }

    pub fn list_devices(&self) -> Result<Vec<Device>> {
        self.read(|tx| {
            let mut stmt = tx.prepare(&format!(
                "SELECT {DEVICE_COLUMNS} FROM devices ORDER BY device_no"
            ))?;
            let rows = stmt.query_map([], device_from_row)?;
            rows.collect()
        })
    }

    pub fn get_device(&self, device_no: u32) -> Result<Device> {
        self.read(|tx| {
            tx.query_row(
                &format!("SELECT {DEVICE_COLUMNS} FROM devices WHERE device_no = ?1"),
                params![device_no],
                device_from_row,
            )
            .optional()
        })?
        .ok_or_else(|| Error::NotFound(format!("device {device_no}")))
    }

    /// Catalogued points of `device_no` whose names are in `names`, in the
    /// order requested. Unknown names are left out.
    pub fn get_points(&self, device_no: u32, names: &[String]) -> Result<Vec<Point>> {
        self.read(|tx| {
            let mut stmt = tx.prepare(
                "SELECT identifier FROM points WHERE device_no = ?1 AND name = ?2",
            )?;
            let mut found = Vec::with_capacity(names.len());
            for name in names {
                let identifier: Option<String> = stmt
                    .query_row(params![device_no, name], |row| row.get(0))
                    .optional()?;
                if let Some(identifier) = identifier {
                    found.push(Point {
                        device_no,
                        name: name.clone(),
                        identifier,
                    });
                }
            }
            Ok(found)
        })
    }

    pub fn list_points(&self, device_no: u32) -> Result<Vec<Point>> {
        self.read(|tx| {
            let mut stmt = tx.prepare(
                "SELECT device_no, name, identifier FROM points WHERE device_no = ?1 ORDER BY name",
            )?;
            let rows = stmt.query_map(params![device_no], |row| {
                Ok(Point {
                    device_no: row.get(0)?,
                    name: row.get(1)?,
                    identifier: row.get(2)?,
                })
            })?;
            rows.collect()
        })
    }

    pub fn count_devices(&self) -> Result<usize> {
        self.read(|tx| {
            let n: i64 = tx.query_row("SELECT COUNT(*) FROM devices", [], |row| row.get(0))?;
            Ok(n as usize)
        })
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Transactions
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> rusqlite::Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sql)?;
        let out = f(&tx).map_err(sql)?;
        tx.commit().map_err(sql)?;
        Ok(out)
    }

    fn read<T>(&self, f: impl FnOnce(&Transaction<'_>) -> rusqlite::Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(sql)?;
        let out = f(&tx).map_err(sql)?;
        tx.finish().map_err(sql)?;
        Ok(out)
    }
}

fn upsert_device_tx(tx: &Transaction<'_>, device: &Device) -> rusqlite::Result<()> {
    tx.execute(
        r#"
        INSERT INTO devices(device_no, address, heartbeat_point_name, heartbeat_point_id,
                            link_status, liveness_status, point_count, last_checked_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(device_no) DO UPDATE SET
          address = excluded.address,
          heartbeat_point_name = excluded.heartbeat_point_name,
          heartbeat_point_id = excluded.heartbeat_point_id,
          link_status = excluded.link_status,
          liveness_status = excluded.liveness_status,
          point_count = excluded.point_count,
          last_checked_at = excluded.last_checked_at
        "#,
        params![
            device.device_no,
            device.address,
            device.heartbeat_point_name,
            device.heartbeat_point_id,
            device.link_status.as_str(),
            device.liveness_status.as_str(),
            device.point_count,
            device.last_checked_at,
        ],
    )?;
    Ok(())
}

fn insert_points_tx(
    tx: &Transaction<'_>,
    device_no: u32,
    points: &[(String, String)],
) -> rusqlite::Result<usize> {
    let mut stmt = tx.prepare(
        "INSERT INTO points(device_no, name, identifier) VALUES (?1, ?2, ?3) \
         ON CONFLICT(device_no, name) DO NOTHING",
    )?;
    let mut inserted = 0;
    for (name, identifier) in points {
        inserted += stmt.execute(params![device_no, name, identifier])?;
    }
    Ok(inserted)
}

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<Device> {
    Ok(Device {
        device_no: row.get(0)?,
        address: row.get(1)?,
        heartbeat_point_name: row.get(2)?,
        heartbeat_point_id: row.get(3)?,
        link_status: link(row, 4)?,
        liveness_status: link(row, 5)?,
        point_count: row.get(6)?,
        last_checked_at: row.get(7)?,
    })
}

fn link(row: &Row<'_>, idx: usize) -> rusqlite::Result<LinkState> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, e.into())
    })
}

fn sql(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}
