use std::collections::HashMap;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

/// A listing site served from memory; every request path (with query) is
/// recorded.
pub struct ListSite {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ListSite {
    /// `pages` maps a request path such as `/list/show/7?page=2` to a status
    /// and body. Unknown paths get a 404.
    pub fn spawn(pages: HashMap<String, (u16, String)>) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start tiny_http server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let url = request.url().to_string();
                seen.lock().expect("lock requests").push(url.clone());

                let (status, body) = pages
                    .get(&url)
                    .cloned()
                    .unwrap_or_else(|| (404, "not found".to_owned()));
                let header = tiny_http::Header::from_bytes(
                    &b"Content-Type"[..],
                    &b"text/html; charset=utf-8"[..],
                )
                .expect("build header");
                let response = tiny_http::Response::from_string(body)
                    .with_status_code(status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("lock requests").clone()
    }
}

impl Drop for ListSite {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// `(title, author, rating text)` rows plus an optional next link.
pub fn listing_page(books: &[(&str, &str, &str)], next_href: Option<&str>) -> String {
    let rows: String = books
        .iter()
        .enumerate()
        .map(|(idx, (title, author, rating))| {
            format!(
                r#"<tr itemscope itemtype="http://schema.org/Book">
  <td class="number">{rank}</td>
  <td width="100%" valign="top">
    <a class="bookTitle" itemprop="url" href="/book/show/{rank}"><span itemprop="name" role="heading">{title}</span></a>
    <br><span class="by">by</span>
    <span itemprop="author" itemscope itemtype="http://schema.org/Person">
      <div class="authorName__container"><a class="authorName" itemprop="url" href="/author/show/{rank}"><span itemprop="name">{author}</span></a></div>
    </span>
    <div><span class="greyText smallText uitext"><span class="minirating"><span class="stars staticStars"></span> {rating}</span></span></div>
  </td>
</tr>"#,
                rank = idx + 1,
            )
        })
        .collect();

    let pagination = match next_href {
        Some(href) => format!(
            r#"<div class="pagination"><span class="previous_page disabled">« previous</span> <em class="current">1</em> <a class="next_page" rel="next" href="{href}">next »</a></div>"#
        ),
        None => r#"<div class="pagination"><a class="previous_page" rel="prev" href="?page=1">« previous</a> <span class="next_page disabled">next »</span></div>"#.to_owned(),
    };

    format!(
        r#"<!doctype html>
<html>
  <head><title>Best Books Ever</title></head>
  <body>
    <table class="tableList js-dataTooltip">
{rows}
    </table>
    {pagination}
  </body>
</html>
"#
    )
}
