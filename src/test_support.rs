//! Shared fixtures: portal pages, a mock SSO/portal server and an
//! instrumented store.

use async_trait::async_trait;
use axum::{
    Form, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::clock::Clock;
use crate::models::cache::CacheKey;
use crate::models::session::SubjectKey;
use crate::repositories::memory_store::MemoryStore;
use crate::repositories::store::{SessionStore, StoreError};

/// Serves `router` on an ephemeral local port and returns its base URL,
/// with a trailing slash.
pub async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}/", addr)
}

pub const EXPIRED_PAGE: &str = r#"<html><body>
<form><select name="valTahun"><option value="ociexecute(): ORA-00936: missing expression">ociexecute(): ORA-00936: missing expression</option></select></form>
</body></html>"#;

/// Wraps a fragment in a page that carries the period selectors.
macro_rules! page {
    ($body:literal) => {
        concat!(
            "<html><body><form>",
            r#"<select name="valTahun"><option value="2023">2023/2024</option><option value="2024" selected>2024/2025</option></select>"#,
            r#"<select name="valSemester"><option value="1" selected>Gasal</option><option value="2">Genap</option></select>"#,
            "</form>",
            $body,
            "</body></html>"
        )
    };
}

pub const ATTENDANCE_PAGE: &str = page!(
    r#"<table>
  <tr><th>Kode</th><th>Mata Kuliah</th><th colspan="4">Minggu</th><th>%</th></tr>
  <tr><th></th><th></th><th>1</th><th>2</th><th>3</th><th>4</th><th></th></tr>
  <tr><td>IF101</td><td>Algoritma dan Pemrograman</td><td>H</td><td>H</td><td>A</td><td>&nbsp;</td><td>75%</td></tr>
  <tr><td>IF102</td><td>Basis Data</td><td>H</td><td>H</td><td>H</td><td>H</td><td>100%</td></tr>
</table>"#
);

pub const GRADES_PAGE: &str = page!(
    r#"<table>
  <tr><th>Kode</th><th>Mata Kuliah</th><th>Nilai</th></tr>
  <tr><td>IF101</td><td>Algoritma dan Pemrograman</td><td>A</td></tr>
  <tr><td>IF102</td><td>Basis Data</td><td>AB</td></tr>
</table>"#
);

pub const STUDY_PLAN_PAGE: &str = page!(
    r#"<table>
  <tr><td>Dosen Wali</td><td>Dr. Budi Santoso</td></tr>
  <tr><td>SKS</td><td>Batas : 24 Sisa : 4</td></tr>
  <tr><td>IP</td><td>IPK : 3.50 IPS : 3.75</td></tr>
  <tr><td>Tanggal Penting</td><td>Pengisian <i>01-08-2024 sd 10-08-2024</i><br>Perubahan <i>11-08-2024 sd 20-08-2024</i><br>Drop <i>21-08-2024 sd 30-09-2024</i></td></tr>
</table>
<table>
  <tr><th>No</th><th>Kode</th><th>Grup</th><th>Mata Kuliah</th><th>Dosen</th><th>SKS</th><th>Kelas</th><th>Disetujui</th></tr>
  <tr><td>1</td><td>IF201</td><td>A</td><td>Struktur Data</td><td>Dr. Budi Santoso</td><td>3</td><td>2 D4 IT A</td><td>Ya</td></tr>
</table>"#
);

pub const SCHEDULE_PAGE: &str = page!(
    r#"<table>
  <tr><td>Kelas</td><td>2 D4 IT A</td></tr>
</table>
<table>
  <tr><th>Hari</th><th>Jadwal</th></tr>
  <tr><td>Senin</td><td><div>Struktur Data<br>Dr. Budi Santoso - 08.00-10.30<br>C-203</div></td></tr>
  <tr><td>Selasa</td><td></td></tr>
</table>"#
);

const LOGIN_FORM_PAGE: &str = r#"<html><body><form method="post">
<input name="username"><input type="password" name="password">
<input type="hidden" name="lt" value="ABC123">
<input type="hidden" name="_eventId" value="submit">
</form></body></html>"#;

const LOGIN_FORM_WITHOUT_TOKEN: &str = r#"<html><body><form method="post">
<input name="username"><input type="password" name="password">
</form></body></html>"#;

const LOGIN_REJECTED_PAGE: &str = r#"<html><body>
<div id="msg" class="errors">Invalid username or password</div>
<form method="post"><input type="hidden" name="lt" value="DEF456"></form>
</body></html>"#;

pub const LOGBOOK_PAGE: &str = r##"<html><body>
<table>
  <tr><td>LOGBOOK KERJA PRAKTEK</td></tr>
</table>
<table>
  <tr><td>Tahun Ajaran</td><td><select id="tahun"><option value="2023">2023/2024</option><option value="2024" selected>2024/2025</option></select></td></tr>
  <tr><td>Semester</td><td><select id="cbSemester"><option value="1" selected>Gasal</option><option value="2">Genap</option></select></td></tr>
  <tr><td>Minggu</td><td><select id="minggu"><option value="1">1</option><option value="2">2</option><option value="3" selected>3</option></select></td></tr>
  <tr><td></td><td>Nama : Jane Doe</td></tr>
  <tr><td></td><td>NRP : 1234567</td></tr>
  <tr><td></td><td>Pembimbing : Dr. Budi Santoso</td></tr>
  <tr><td></td><td>Tempat KP : PT Nusantara Digital</td></tr>
  <tr><td></td><td>Tanggal KP : 01-07-2024 s/d 31-08-2024</td></tr>
</table>
<form>
  <input type="hidden" id="kp_daftar" value="KP-881">
  <input type="hidden" id="mahasiswa" value="55120">
  <select id="matakuliah"><option value="">-- Pilih --</option><option value="4101">Kerja Praktek</option><option value="4102">Etika Profesi</option></select>
</form>
<table>
  <tr><th>No</th><th>Tanggal</th><th>Jam Mulai</th><th>Jam Selesai</th><th>Kegiatan</th><th>Mata Kuliah</th><th>Progres</th><th>Foto</th><th>Cetak</th><th>Hapus</th></tr>
  <tr><td>1</td><td>15-07-2024</td><td>08:00</td><td>16:00</td><td>Instalasi server staging</td><td>Kerja Praktek</td><td><a href="files/progres_31.pdf">progres</a></td><td><a href="files/foto_31.jpg">foto</a></td><td><a href="cetak_logbook.php?id=31">cetak</a></td><td><img src="hapus.png"></td></tr>
  <tr><td>2</td><td>16-07-2024</td><td>08:00</td><td>15:30</td><td>Review kode</td><td>Etika Profesi</td><td><a href="#"></a></td><td><a href="files/foto_32.jpg">foto</a></td><td><a href="cetak_logbook.php?id=32">cetak</a></td><td></td></tr>
</table>
<table>
  <tr><th>Catatan Dosen</th></tr>
  <tr><td>Lanjutkan dokumentasi.</td></tr>
</table>
<table>
  <tr><th>Catatan Perusahaan</th></tr>
  <tr><td>Kinerja baik.</td></tr>
</table>
</body></html>"##;

/// The page the portal lands on after login, for one identity.
pub fn landing_page(name: &str, subject: &str) -> String {
    format!(
        r#"<html><body onload="showEntry_Logbook_KP1(2024, 1, 3)">
<table><tr><td class="userout"><a href="logout.php">Logged in as: {} ({})</a></td></tr></table>
</body></html>"#,
        name, subject
    )
}

/// A stand-in for the SSO service and the portal behind it.
///
/// `POST cas/login` accepts any username with the password `secret` and
/// issues one portal session per user. Usernames starting with `jane` get
/// [`MockPortal::SESSION`], which belongs to Jane Doe (`1234567`); any other
/// user `u` gets `session-u` and is shown on the portal as subject `u`.
#[derive(Clone, Default)]
pub struct MockPortal {
    page_hits: Arc<AtomicUsize>,
    expired: Arc<AtomicBool>,
    broken_markup: Arc<AtomicBool>,
    no_login_token: Arc<AtomicBool>,
    last_login_form: Arc<Mutex<Option<HashMap<String, String>>>>,
    last_login_cookie: Arc<Mutex<Option<String>>>,
}

impl MockPortal {
    pub const SESSION: &'static str = "portal-session";

    /// Serves the mock and returns its base URL.
    pub async fn spawn(&self) -> String {
        spawn_upstream(self.router()).await
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/cas/login", get(login_form).post(login_submit))
            .route("/portal/index.php", get(service_ticket))
            .route("/portal/mEntry_Logbook_KP1.php", get(landing))
            .route("/portal/absen.php", get(data_page))
            .route("/portal/FRS_mbkm.php", get(data_page))
            .route("/portal/jadwal_kul.php", get(data_page))
            .route("/portal/nilai_sem.php", get(data_page))
            .route("/portal/entry_logbook_kp1.php", get(data_page))
            .with_state(self.clone())
    }

    /// Makes the portal treat every session as expired from now on.
    pub fn expire_sessions(&self) {
        self.expired.store(true, Ordering::SeqCst);
    }

    /// Makes data pages come back without their expected layout.
    pub fn break_markup(&self) {
        self.broken_markup.store(true, Ordering::SeqCst);
    }

    /// Makes the login form come back without its `lt` token.
    pub fn drop_login_token(&self) {
        self.no_login_token.store(true, Ordering::SeqCst);
    }

    /// The portal session issued to `username`.
    pub fn session_for(username: &str) -> String {
        let user: String = username
            .split('@')
            .next()
            .unwrap_or_default()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();

        if user.starts_with("jane") {
            Self::SESSION.to_string()
        } else {
            format!("session-{}", user)
        }
    }

    /// How many portal pages (session checks included) were served.
    pub fn page_hits(&self) -> usize {
        self.page_hits.load(Ordering::SeqCst)
    }

    pub fn last_login_form(&self) -> Option<HashMap<String, String>> {
        self.last_login_form.lock().unwrap().clone()
    }

    pub fn last_login_cookie(&self) -> Option<String> {
        self.last_login_cookie.lock().unwrap().clone()
    }

    /// The `(display name, subject)` owning the request's live session.
    fn session_owner(&self, headers: &HeaderMap) -> Option<(String, String)> {
        if self.expired.load(Ordering::SeqCst) {
            return None;
        }

        let session = headers
            .get(header::COOKIE)
            .and_then(|v| v.to_str().ok())?
            .split("; ")
            .find_map(|pair| pair.strip_prefix("PHPSESSID="))?;

        if session == Self::SESSION {
            return Some(("Jane Doe".to_string(), "1234567".to_string()));
        }

        session
            .strip_prefix("session-")
            .filter(|user| !user.is_empty())
            .map(|user| (user.to_string(), user.to_string()))
    }
}

async fn login_form(State(mock): State<MockPortal>) -> Response {
    let body = if mock.no_login_token.load(Ordering::SeqCst) {
        LOGIN_FORM_WITHOUT_TOKEN
    } else {
        LOGIN_FORM_PAGE
    };

    (
        [(header::SET_COOKIE, "JSESSIONID=xyz; Path=/cas; HttpOnly")],
        axum::response::Html(body),
    )
        .into_response()
}

async fn login_submit(
    State(mock): State<MockPortal>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let accepted = form.get("password").map(String::as_str) == Some("secret");
    let username = form.get("username").cloned().unwrap_or_default();

    *mock.last_login_cookie.lock().unwrap() = cookie;
    *mock.last_login_form.lock().unwrap() = Some(form);

    if accepted {
        let ticket = format!("/portal/index.php?ticket=ST-{}", MockPortal::session_for(&username));
        (StatusCode::FOUND, [(header::LOCATION, ticket)]).into_response()
    } else {
        axum::response::Html(LOGIN_REJECTED_PAGE).into_response()
    }
}

async fn service_ticket(Query(query): Query<HashMap<String, String>>) -> Response {
    let session = query
        .get("ticket")
        .and_then(|ticket| ticket.strip_prefix("ST-"))
        .unwrap_or(MockPortal::SESSION)
        .to_string();

    (
        [(header::SET_COOKIE, format!("PHPSESSID={}; Path=/", session))],
        axum::response::Html("<html><body>Redirecting</body></html>"),
    )
        .into_response()
}

async fn landing(State(mock): State<MockPortal>, headers: HeaderMap) -> Response {
    mock.page_hits.fetch_add(1, Ordering::SeqCst);

    match mock.session_owner(&headers) {
        Some((name, subject)) => axum::response::Html(landing_page(&name, &subject)).into_response(),
        None => axum::response::Html(EXPIRED_PAGE).into_response(),
    }
}

async fn data_page(
    State(mock): State<MockPortal>,
    uri: axum::http::Uri,
    headers: HeaderMap,
) -> Response {
    mock.page_hits.fetch_add(1, Ordering::SeqCst);

    if mock.session_owner(&headers).is_none() {
        return axum::response::Html(EXPIRED_PAGE).into_response();
    }
    if mock.broken_markup.load(Ordering::SeqCst) {
        return axum::response::Html("<html><body>Maintenance</body></html>").into_response();
    }

    let page = match uri.path().rsplit('/').next().unwrap_or_default() {
        "absen.php" => ATTENDANCE_PAGE,
        "FRS_mbkm.php" => STUDY_PLAN_PAGE,
        "jadwal_kul.php" => SCHEDULE_PAGE,
        "entry_logbook_kp1.php" => LOGBOOK_PAGE,
        _ => GRADES_PAGE,
    };
    axum::response::Html(page).into_response()
}

/// The error a refusing store reports.
pub fn refused(reason: &'static str) -> StoreError {
    StoreError::Redis(redis::RedisError::from((redis::ErrorKind::IoError, reason)))
}

/// A `MemoryStore` that counts calls and can be told to fail.
#[derive(Clone, Default)]
pub struct CountingStore {
    inner: MemoryStore,
    pub gets: Arc<AtomicUsize>,
    pub sets: Arc<AtomicUsize>,
    pub deletes: Arc<AtomicUsize>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl CountingStore {
    /// A store whose entries expire by `clock` rather than the system time.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: MemoryStore::with_clock(clock),
            ..Self::default()
        }
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionStore for CountingStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(refused("read refused"));
        }
        self.inner.get(key).await
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(refused("write refused"));
        }
        self.inner.set(key, value, expires_at).await
    }

    async fn delete_subject(&self, subject: &SubjectKey) -> Result<u64, StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(refused("delete refused"));
        }
        self.inner.delete_subject(subject).await
    }
}
