//! Request handler
//!
//! Runs one request through the control-panel cycle: publish the outcome of
//! a finished run, merge the posted form into the state store, check the
//! session, apply language and project switches, dispatch the command, then
//! resolve and render the page.
//!
//! All of it happens under the context lock. Network reads and writes stay
//! outside of it, in the accept loop.

use crate::config::ServerConfig;
use crate::control::dispatch::{CommandDispatcher, ERROR_PAGE};
use crate::control::request::{HttpRequest, Method};
use crate::control::response::{is_image, ContentKind, HttpResponse};
use crate::engine::{CrawlEngine, RunStatus};
use crate::lang::{decode_text, LanguageCatalog};
use crate::project::{load_profile, user_profile_path, ProjectLayout};
use crate::security::{
    generate_session_id, sanitize_request_path, session_matches, validate_project_name,
    validate_redirect, SecurityEvent,
};
use crate::state::StateStore;
use crate::template::{render, RenderContext};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Landing page, served for `/`
pub const INDEX_PAGE: &str = "/server/index.html";

/// Page shown while a mirror runs
pub const REFRESH_PAGE: &str = "/server/refresh.html";

/// Page shown once a mirror has ended
pub const FINISHED_PAGE: &str = "/server/finished.html";

/// Prefix of paths served from the current project's output directory
pub const VIRTUAL_PREFIX: &str = "/website/";

/// Directory under the installation directory holding the pages
pub const HTML_DIR: &str = "html";

/// Context shared between the accept loop and the engine callbacks
pub type SharedContext = Arc<Mutex<ServerContext>>;

/// Everything a request can read or change
pub struct ServerContext {
    state: StateStore,
    catalog: LanguageCatalog,
    dispatcher: CommandDispatcher,
    install_dir: PathBuf,
    home_dir: PathBuf,
}

/// Result of handling one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Response to send; `None` sends nothing
    pub response: Option<HttpResponse>,
    /// Stop accepting connections after this one
    pub quit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProfileLoad {
    Project,
    User,
}

impl ServerContext {
    /// Build the context for a freshly started server
    pub fn new(config: &ServerConfig, catalog: LanguageCatalog, engine: Arc<dyn CrawlEngine>) -> Self {
        let session_id = generate_session_id();
        SecurityEvent::SessionIssued.log();
        Self {
            state: config.initial_state(&session_id),
            catalog,
            dispatcher: CommandDispatcher::new(engine, RunStatus::new(), &config.home_dir),
            install_dir: config.install_dir.clone(),
            home_dir: config.home_dir.clone(),
        }
    }

    /// Wrap the context for sharing
    pub fn shared(self) -> SharedContext {
        Arc::new(Mutex::new(self))
    }

    /// State store
    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Mutable state store
    pub fn state_mut(&mut self) -> &mut StateStore {
        &mut self.state
    }

    /// Language catalog
    pub fn catalog(&self) -> &LanguageCatalog {
        &self.catalog
    }

    /// Status of the background operation
    pub fn run(&self) -> &Arc<RunStatus> {
        self.dispatcher.run()
    }

    /// Handle one request
    pub fn handle(&mut self, request: HttpRequest) -> Reply {
        let mut method = request.method;
        if let Some(iso) = request.accept_language.as_deref() {
            match self.catalog.find_language_by_iso(iso) {
                Some(index) => debug!("Browser language '{}' is catalog language {}", iso, index + 1),
                None => debug!("Browser language '{}' is not installed", iso),
            }
        }

        self.publish_run_outcome();

        if let Some(sid) = self.state.read("_sid").map(str::to_string) {
            self.state.set("sid", sid);
        }
        if method.is_known() {
            for (key, value) in request.form() {
                self.state.set(key, value);
            }
        }
        if let (Some(expected), Some(received)) = (self.state.read("_sid"), self.state.read("sid")) {
            if !session_matches(Some(expected), Some(received)) {
                SecurityEvent::SessionMismatch {
                    received: received.to_string(),
                }
                .log();
                method = Method::Unknown;
            }
        }

        if !method.is_known() {
            self.state.remove("command");
            return Reply {
                response: protocol_error(),
                quit: false,
            };
        }

        self.switch_language();
        let load = self.take_profile_request();
        let project_dir = if self.run().is_running() {
            None
        } else {
            self.project_dir()
        };
        if let Some(load) = load {
            self.load_profile(load, project_dir.as_deref());
        }

        let outcome = self.dispatcher.dispatch(&mut self.state, project_dir.as_deref());

        let Some(target) = request.target.as_deref() else {
            return Reply {
                response: protocol_error(),
                quit: outcome.quit,
            };
        };

        let response = self.respond(target, method, outcome.error_redirect, outcome.quit, project_dir.as_deref());
        Reply {
            response: Some(response),
            quit: outcome.quit,
        }
    }

    /// Publish the result of an ended run, once
    fn publish_run_outcome(&mut self) {
        let Some(outcome) = self.run().take_unpublished_outcome() else {
            return;
        };
        if outcome.code != 0 {
            info!("Publishing run failure {}: {}", outcome.code, outcome.message);
            self.state.set("commandReturn", outcome.code.to_string());
            self.state.set("commandReturnMsg", outcome.message);
            self.state.set("commandReturnCmdl", outcome.cmdline);
        } else {
            self.state.remove("commandReturn");
            self.state.remove("commandReturnMsg");
            self.state.remove("commandReturnCmdl");
        }
    }

    /// Apply a `lang` form value, 1-based
    fn switch_language(&mut self) {
        let Some(requested) = self.state.read_int("lang") else {
            return;
        };
        if requested <= 0 {
            return;
        }
        let Ok(index) = usize::try_from(requested - 1) else {
            return;
        };
        if index == self.catalog.active_language() {
            return;
        }
        match self.catalog.select_language(index) {
            Ok(_) => {
                // the pages overwrite `lang`, keep what was selected
                if let Some(value) = self.state.read("lang").map(str::to_string) {
                    self.state.set("lang_", value);
                }
            }
            Err(e) => warn!("Cannot switch language: {}", e),
        }
    }

    /// Consume `loadprojname` / `loadprojcateg` and decide which profile to
    /// load; the user profile wins on the very first request
    fn take_profile_request(&mut self) -> Option<ProfileLoad> {
        let mut load = None;
        if let Some(name) = self.state.take("loadprojname") {
            if !name.is_empty() {
                self.state.set("projname", name);
            }
            load = Some(ProfileLoad::Project);
        } else if let Some(category) = self.state.take("loadprojcateg") {
            if !category.is_empty() {
                self.state.set("projcateg", category);
            }
        }

        if !self.state.contains("conf_file_loaded") {
            self.state.set("conf_file_loaded", "true");
            load = Some(ProfileLoad::User);
        }
        load
    }

    /// `<path>/<projname>` when both are known
    fn project_dir(&self) -> Option<PathBuf> {
        let path = self.state.read("path").filter(|p| !p.is_empty())?;
        let name = self.state.read("projname")?;
        if let Err(e) = validate_project_name(name) {
            warn!("{}", e);
            return None;
        }
        Some(ProjectLayout::new(Path::new(path), name).dir().to_path_buf())
    }

    fn load_profile(&mut self, load: ProfileLoad, project_dir: Option<&Path>) {
        let path = match load {
            ProfileLoad::Project => match project_dir {
                Some(dir) => ProjectLayout::from_dir(dir).profile_path(),
                None => {
                    debug!("No project directory to load a profile from");
                    return;
                }
            },
            ProfileLoad::User => user_profile_path(&self.home_dir),
        };
        match load_profile(&path, &mut self.state) {
            Ok(count) => debug!("Loaded {} settings from {:?}", count, path),
            Err(e) => warn!("Cannot load {:?}: {}", path, e),
        }
    }

    /// Resolve the page for `target` and build the response
    fn respond(
        &mut self,
        target: &str,
        mut method: Method,
        error_redirect: bool,
        quitting: bool,
        project_dir: Option<&Path>,
    ) -> HttpResponse {
        let mut file = if error_redirect {
            method = Method::Post;
            ERROR_PAGE.to_string()
        } else {
            let path = match sanitize_request_path(target) {
                Ok(path) => path,
                Err(_) => {
                    SecurityEvent::PathTraversal {
                        path: target.to_string(),
                    }
                    .log();
                    return finish(HttpResponse::not_found(), method);
                }
            };
            if path == "/" {
                method = Method::Post;
                INDEX_PAGE.to_string()
            } else {
                path
            }
        };

        let virtual_path = file.starts_with(VIRTUAL_PREFIX);
        let run = self.run().clone();
        if run.is_running() {
            if !is_image(&file) {
                file = REFRESH_PAGE.to_string();
            }
        } else if run.is_ended() && !virtual_path && !quitting && !is_image(&file) {
            file = FINISHED_PAGE.to_string();
        }

        let Some(fs_path) = self.file_path(&file) else {
            return finish(HttpResponse::not_found(), method);
        };
        let bytes = match fs::read(&fs_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Cannot open {:?}: {}", fs_path, e);
                return finish(HttpResponse::not_found(), method);
            }
        };

        self.state.set("thisfile", file.as_str());

        if method == Method::Post && quitting {
            method = Method::Get;
        }

        if method == Method::Post {
            let location = self
                .state
                .take("redirect")
                .filter(|r| !r.is_empty())
                .filter(|r| match validate_redirect(r) {
                    Ok(()) => true,
                    Err(_) => {
                        SecurityEvent::HeaderInjection {
                            location: r.clone(),
                        }
                        .log();
                        false
                    }
                })
                .unwrap_or(file);
            return HttpResponse::redirect(&location);
        }

        let kind = ContentKind::from_path(&file);
        let body = match kind {
            ContentKind::Html => {
                let mut ctx = RenderContext {
                    state: &mut self.state,
                    catalog: &self.catalog,
                    install_dir: &self.install_dir,
                    project_dir,
                };
                render(&decode_text(&bytes), &mut ctx)
            }
            ContentKind::Text | ContentKind::Image(_) => bytes,
        };
        finish(HttpResponse::content(kind, body), method)
    }

    /// Filesystem location of a page
    fn file_path(&self, file: &str) -> Option<PathBuf> {
        match file.strip_prefix(VIRTUAL_PREFIX) {
            Some(rest) => {
                let Some(root) = self.state.read("projpath").filter(|p| !p.is_empty()) else {
                    debug!("No projpath for {}", file);
                    return None;
                };
                Some(Path::new(root).join(rest))
            }
            None => Some(
                self.install_dir
                    .join(HTML_DIR)
                    .join(file.trim_start_matches('/')),
            ),
        }
    }
}

/// Only GET carries a body
fn finish(response: HttpResponse, method: Method) -> HttpResponse {
    if method == Method::Get {
        response
    } else {
        response.headers_only()
    }
}

/// Answer to an unrecognised request: a 500 page in debug builds, silence
/// otherwise
fn protocol_error() -> Option<HttpResponse> {
    if cfg!(debug_assertions) {
        Some(HttpResponse::server_error())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::response::Status;
    use crate::engine::{MockCrawlEngine, StopLevel};
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        ctx: ServerContext,
        root: PathBuf,
    }

    fn fixture(engine: MockCrawlEngine) -> Fixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path().to_path_buf();
        let install = root.join("install");
        std::fs::create_dir_all(install.join("lang")).unwrap();
        std::fs::create_dir_all(install.join("html/server")).unwrap();
        std::fs::create_dir_all(install.join("html/images")).unwrap();
        std::fs::write(
            install.join("lang.def"),
            "English\nLANGUAGE_1\nFrancais\nLANGUAGE_2\nLANGUAGE_ISO\nLANGUAGE_ISO\nLANG_HELLO\nHello\n",
        )
        .unwrap();
        std::fs::write(install.join("lang/English.txt"), "LANGUAGE_ISO\nen\nHello\nHello\n").unwrap();
        std::fs::write(install.join("lang/Francais.txt"), "LANGUAGE_ISO\nfr\nHello\nBonjour\n").unwrap();
        std::fs::write(install.join("html/server/index.html"), "${LANG_HELLO}\n").unwrap();
        std::fs::write(install.join("html/server/refresh.html"), "running\n").unwrap();
        std::fs::write(install.join("html/server/finished.html"), "finished ${commandReturn}\n").unwrap();
        std::fs::write(install.join("html/server/error.html"), "${error}\n").unwrap();
        std::fs::write(install.join("html/server/step2.html"), "<b>${sid}</b>\n").unwrap();
        std::fs::write(install.join("html/images/logo.gif"), b"GIF89a").unwrap();

        let mut config = ServerConfig::default();
        config.install_dir = install.clone();
        config.home_dir = root.join("home");
        config.websites_dir = root.join("websites");
        std::fs::create_dir_all(&config.home_dir).unwrap();

        let catalog = LanguageCatalog::load(&install).unwrap();
        let ctx = ServerContext::new(&config, catalog, Arc::new(engine));
        Fixture { _dir: dir, ctx, root }
    }

    fn get(target: &str) -> HttpRequest {
        HttpRequest::from_request_line(&format!("GET {} HTTP/1.0", target))
    }

    fn post(target: &str, body: &str) -> HttpRequest {
        let mut request = HttpRequest::from_request_line(&format!("POST {} HTTP/1.0", target));
        request.body = body.as_bytes().to_vec();
        request
    }

    fn body(reply: &Reply) -> String {
        String::from_utf8(reply.response.as_ref().unwrap().body.clone()).unwrap()
    }

    #[test]
    fn test_get_renders_template() {
        let mut fx = fixture(MockCrawlEngine::new());
        let sid = fx.ctx.state().read("_sid").unwrap().to_string();
        let reply = fx.ctx.handle(get("/server/step2.html?x=1"));
        let response = reply.response.as_ref().unwrap();
        assert_eq!(response.status, Status::Ok);
        assert_eq!(body(&reply), format!("<b>{}</b>\r\n", sid));
        assert_eq!(fx.ctx.state().read("thisfile"), Some("/server/step2.html"));
        assert_eq!(fx.ctx.state().read("conf_file_loaded"), Some("true"));
    }

    #[test]
    fn test_root_redirects() {
        let mut fx = fixture(MockCrawlEngine::new());
        let reply = fx.ctx.handle(get("/"));
        let response = reply.response.unwrap();
        assert_eq!(response.status, Status::Redirect);
        assert!(response
            .headers
            .contains(&("Location".to_string(), INDEX_PAGE.to_string())));
        assert!(!response.send_body);
    }

    #[test]
    fn test_post_redirect_uses_redirect_key() {
        let mut fx = fixture(MockCrawlEngine::new());
        let sid = fx.ctx.state().read("_sid").unwrap().to_string();
        let reply = fx.ctx.handle(post(
            "/server/step2.html",
            &format!("sid={}&projname=site&redirect=%2Fserver%2Findex.html&", sid),
        ));
        let response = reply.response.unwrap();
        assert_eq!(response.status, Status::Redirect);
        assert!(response
            .headers
            .contains(&("Location".to_string(), "/server/index.html".to_string())));
        assert_eq!(fx.ctx.state().read("projname"), Some("site"));
        assert!(!fx.ctx.state().contains("redirect"));
    }

    #[test]
    fn test_redirect_with_line_break_falls_back_to_file() {
        let mut fx = fixture(MockCrawlEngine::new());
        let sid = fx.ctx.state().read("_sid").unwrap().to_string();
        let reply = fx.ctx.handle(post(
            "/server/step2.html",
            &format!("sid={}&redirect=%2Fx%0D%0ASet-Cookie%3A+a%3Db&", sid),
        ));
        let response = reply.response.unwrap();
        assert_eq!(response.status, Status::Redirect);
        assert!(response
            .headers
            .contains(&("Location".to_string(), "/server/step2.html".to_string())));
        assert!(response
            .headers
            .iter()
            .all(|(_, value)| !value.contains(['\r', '\n'])));
        assert!(!fx.ctx.state().contains("redirect"));
    }

    #[test]
    fn test_session_mismatch_is_rejected() {
        let mut fx = fixture(MockCrawlEngine::new());
        let reply = fx.ctx.handle(post("/server/step2.html", "sid=forged&command=quit&"));
        assert!(!reply.quit);
        assert!(!fx.ctx.state().contains("command"));
        if cfg!(debug_assertions) {
            assert_eq!(reply.response.unwrap().status, Status::ServerError);
        } else {
            assert!(reply.response.is_none());
        }
    }

    #[test]
    fn test_traversal_is_not_found() {
        let mut fx = fixture(MockCrawlEngine::new());
        fx.ctx.state_mut().set("projpath", fx.root.join("websites/site").to_string_lossy());
        let reply = fx.ctx.handle(get("/website/../../etc/passwd"));
        let response = reply.response.as_ref().unwrap();
        assert_eq!(response.status, Status::NotFound);
        assert_eq!(body(&reply), "Page not found.\r\n");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let mut fx = fixture(MockCrawlEngine::new());
        let reply = fx.ctx.handle(get("/server/nope.html"));
        assert_eq!(reply.response.unwrap().status, Status::NotFound);
    }

    #[test]
    fn test_head_has_no_body() {
        let mut fx = fixture(MockCrawlEngine::new());
        let request = HttpRequest::from_request_line("HEAD /images/logo.gif HTTP/1.0");
        let response = fx.ctx.handle(request).response.unwrap();
        assert_eq!(response.status, Status::Ok);
        assert!(!response.send_body);
        assert_eq!(response.body, b"GIF89a");
    }

    #[test]
    fn test_language_switch() {
        let mut fx = fixture(MockCrawlEngine::new());
        let sid = fx.ctx.state().read("_sid").unwrap().to_string();
        fx.ctx.handle(post("/server/step2.html", &format!("sid={}&lang=2&", sid)));
        assert_eq!(fx.ctx.catalog().active_language(), 1);
        assert_eq!(fx.ctx.state().read("lang_"), Some("2"));

        let reply = fx.ctx.handle(get("/server/index.html"));
        assert_eq!(body(&reply), "Bonjour\r\n");
    }

    #[test]
    fn test_load_project_profile() {
        let mut fx = fixture(MockCrawlEngine::new());
        let cache = fx.root.join("websites/site/hts-cache");
        std::fs::create_dir_all(&cache).unwrap();
        std::fs::write(cache.join("winprofile.ini"), "Depth=5\nCategory=Docs\n").unwrap();

        // first request loads the user profile
        fx.ctx.handle(get("/server/step2.html"));
        let sid = fx.ctx.state().read("_sid").unwrap().to_string();
        fx.ctx
            .handle(post("/server/step2.html", &format!("sid={}&loadprojname=site&", sid)));
        assert_eq!(fx.ctx.state().read("projname"), Some("site"));
        assert_eq!(fx.ctx.state().read("Depth"), Some("5"));
        assert!(!fx.ctx.state().contains("loadprojname"));
    }

    #[test]
    fn test_running_serves_refresh_page_but_images() {
        let mut fx = fixture(MockCrawlEngine::new());
        fx.ctx.run().begin("");

        assert_eq!(body(&fx.ctx.handle(get("/server/step2.html"))), "running\r\n");
        assert_eq!(fx.ctx.handle(get("/images/logo.gif")).response.unwrap().body, b"GIF89a");
    }

    #[test]
    fn test_finished_publishes_outcome() {
        let mut fx = fixture(MockCrawlEngine::new());
        fx.ctx.run().begin("--mirror x");
        fx.ctx.run().finish(3, "Mirror exited with code 3");

        let reply = fx.ctx.handle(get("/server/step2.html"));
        assert_eq!(body(&reply), "finished 3\r\n");
        assert_eq!(fx.ctx.state().read("commandReturnCmdl"), Some("--mirror x"));
    }

    #[test]
    fn test_cancel_twice_forces_stop() {
        let mut engine = MockCrawlEngine::new();
        engine.expect_stop().times(2).return_const(());
        let mut fx = fixture(engine);
        fx.ctx.run().begin("");
        let sid = fx.ctx.state().read("_sid").unwrap().to_string();

        fx.ctx.handle(post("/", &format!("sid={}&command=cancel&", sid)));
        assert_eq!(fx.ctx.run().stop_level(), StopLevel::Graceful);
        fx.ctx.handle(post("/", &format!("sid={}&command=cancel&", sid)));
        assert_eq!(fx.ctx.run().stop_level(), StopLevel::Forced);
    }

    #[test]
    fn test_error_redirect() {
        let mut fx = fixture(MockCrawlEngine::new());
        let sid = fx.ctx.state().read("_sid").unwrap().to_string();
        let reply = fx.ctx.handle(post(
            "/server/step2.html",
            &format!("sid={}&command=httrack&command_do=start&", sid),
        ));
        let response = reply.response.unwrap();
        assert_eq!(response.status, Status::Redirect);
        assert!(response
            .headers
            .contains(&("Location".to_string(), ERROR_PAGE.to_string())));

        let page = fx.ctx.handle(get(ERROR_PAGE));
        assert_eq!(
            body(&page),
            "Internal server error: unable to fetch project name or path\r\n"
        );
    }

    #[test]
    fn test_quit_forces_get() {
        let mut fx = fixture(MockCrawlEngine::new());
        let sid = fx.ctx.state().read("_sid").unwrap().to_string();
        let reply = fx.ctx.handle(post("/server/step2.html", &format!("sid={}&command=quit&", sid)));
        assert!(reply.quit);
        let response = reply.response.unwrap();
        assert_eq!(response.status, Status::Ok);
        assert!(response.send_body);
    }
}
