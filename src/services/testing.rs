//! In-memory Moodle double used by service and pipeline tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::transport::{PageResponse, PageTransport};
use crate::error::{AppError, Result};

pub const HOME: &str = "https://lms.test/my/";
pub const LOGIN: &str = "https://lms.test/login/index.php";
pub const OVERVIEW: &str = "https://lms.test/grade/report/overview/index.php";
pub const USERNAME: &str = "student";
pub const PASSWORD: &str = "hunter2";
pub const LOGIN_TOKEN: &str = "tok123";

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

pub fn login_page() -> String {
    format!(
        r#"<html><body>
        <form class="login-form" action="/login/index.php" method="post" id="login">
            <input type="hidden" name="logintoken" value="{LOGIN_TOKEN}">
            <input type="hidden" name="anchor" value="">
            <input type="text" name="username" value="">
            <input type="password" name="password" value="">
            <input type="submit" name="submit" value="Log in">
            <button type="submit">Log in</button>
        </form>
        </body></html>"#
    )
}

pub fn home_page() -> String {
    r#"<html><body><h2>Dashboard</h2>
    <a href="https://lms.test/login/logout.php?sesskey=abc">Log out</a>
    </body></html>"#
        .to_string()
}

pub fn overview_page(courses: &[(&str, &str)]) -> String {
    let rows: String = courses
        .iter()
        .enumerate()
        .map(|(i, (title, href))| {
            format!(
                r#"<tr><td class="cell c0"><a href="{href}">{title}</a></td><td class="cell c1">{i}</td></tr>"#
            )
        })
        .collect();
    format!(
        r#"<html><body><table id="overview-grade"><tbody>{rows}
        <tr class="emptyrow"><td class="cell c0"></td><td class="cell c1"></td></tr>
        </tbody></table></body></html>"#
    )
}

/// Course page with rows of `(name, score, percentage, feedback)` out of 10.
pub fn course_page(title: &str, items: &[(&str, &str, &str, &str)]) -> String {
    let rows: String = items
        .iter()
        .map(|(name, score, percentage, feedback)| {
            format!(
                r#"<tr>
                <th class="level2"><div class="rowtitle"><a href="/mod/assign/view.php">{name}</a></div></th>
                <td class="column-weight">10.00 %</td>
                <td class="column-grade"><span>{score}</span></td>
                <td class="column-range">0&ndash;10</td>
                <td class="column-percentage">{percentage}</td>
                <td class="column-contributiontocoursetotal">1.00 %</td>
                <td class="column-feedback"><div>{feedback}</div></td>
                </tr>"#
            )
        })
        .collect();
    format!(
        r#"<html><body>
        <div class="page-header-headings"><h1>{title}</h1></div>
        <table class="user-grade"><tbody>
        <tr><th class="level1"><div class="rowtitle"><span>{title}</span></div></th>
            <td colspan="6"><span title="Aggregation">Natural</span></td></tr>
        {rows}
        <tr><th class="level1"><div class="rowtitle"><span>Course total</span></div></th>
            <td>-</td><td><span title="Aggregation">Sum</span>80.00</td><td>0&ndash;100</td><td>80 %</td><td>-</td><td></td></tr>
        </tbody></table></body></html>"#
    )
}

/// Moodle stand-in: protected pages redirect to the login page until a
/// valid login form is posted.
pub struct FakeMoodle {
    pages: Mutex<HashMap<String, String>>,
    failing: Mutex<HashSet<String>>,
    statuses: Mutex<HashMap<String, u16>>,
    guarded: Mutex<HashSet<String>>,
    logged_in: AtomicBool,
    pub password: Mutex<String>,
    pub login_delay: Duration,
    pub gets: Mutex<Vec<String>>,
    pub posts: AtomicUsize,
}

impl FakeMoodle {
    pub fn new() -> Self {
        let fake = Self {
            pages: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            statuses: Mutex::new(HashMap::new()),
            guarded: Mutex::new(HashSet::new()),
            logged_in: AtomicBool::new(false),
            password: Mutex::new(PASSWORD.to_string()),
            login_delay: Duration::from_millis(0),
            gets: Mutex::new(Vec::new()),
            posts: AtomicUsize::new(0),
        };
        fake.set_page(HOME, &home_page());
        fake
    }

    pub fn with_login_delay(mut self, delay: Duration) -> Self {
        self.login_delay = delay;
        self
    }

    pub fn set_page(&self, url: &str, html: &str) {
        self.pages
            .lock()
            .unwrap()
            .insert(url.to_string(), html.to_string());
    }

    pub fn fail(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    /// Protected page that answers `status` once logged in.
    pub fn set_status(&self, url: &str, status: u16) {
        self.statuses
            .lock()
            .unwrap()
            .insert(url.to_string(), status);
    }

    /// Page that redirects to the login page even with a valid session.
    pub fn always_redirect(&self, url: &str) {
        self.guarded.lock().unwrap().insert(url.to_string());
    }

    pub fn log_in(&self) {
        self.logged_in.store(true, Ordering::SeqCst);
    }

    pub fn expire_session(&self) {
        self.logged_in.store(false, Ordering::SeqCst);
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    pub fn posts(&self) -> usize {
        self.posts.load(Ordering::SeqCst)
    }

    pub fn get_count(&self, url: &str) -> usize {
        self.gets.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    fn respond(status: u16, final_url: &str, body: String) -> PageResponse {
        PageResponse {
            status,
            final_url: url(final_url),
            body: body.into_bytes(),
        }
    }
}

#[async_trait]
impl PageTransport for FakeMoodle {
    async fn get(&self, target: &Url) -> Result<PageResponse> {
        let key = target.to_string();
        self.gets.lock().unwrap().push(key.clone());

        if key == LOGIN {
            return Ok(Self::respond(200, LOGIN, login_page()));
        }
        if self.failing.lock().unwrap().contains(&key) {
            return Err(AppError::Transport {
                url: key,
                status: None,
                message: "connection reset".into(),
            });
        }

        if self.guarded.lock().unwrap().contains(&key) {
            return Ok(Self::respond(200, LOGIN, login_page()));
        }

        let status = self.statuses.lock().unwrap().get(&key).copied();
        let page = self.pages.lock().unwrap().get(&key).cloned();
        match (status, page) {
            (Some(_), _) | (_, Some(_)) if !self.is_logged_in() => {
                Ok(Self::respond(200, LOGIN, login_page()))
            }
            (Some(status), _) => Ok(Self::respond(status, &key, "error".into())),
            (None, Some(html)) => Ok(Self::respond(200, &key, html)),
            (None, None) => Ok(Self::respond(404, &key, "not found".into())),
        }
    }

    async fn post_form(&self, target: &Url, fields: &[(String, String)]) -> Result<PageResponse> {
        self.posts.fetch_add(1, Ordering::SeqCst);
        if !self.login_delay.is_zero() {
            tokio::time::sleep(self.login_delay).await;
        }

        let field = |name: &str| {
            fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str())
        };
        let password = self.password.lock().unwrap().clone();
        let accepted = target.as_str() == LOGIN
            && field("logintoken") == Some(LOGIN_TOKEN)
            && field("username") == Some(USERNAME)
            && field("password") == Some(password.as_str())
            && field("submit").is_none();

        if accepted {
            self.log_in();
            Ok(Self::respond(200, HOME, home_page()))
        } else {
            Ok(Self::respond(
                200,
                LOGIN,
                format!("<p>Invalid login, please try again</p>{}", login_page()),
            ))
        }
    }
}
