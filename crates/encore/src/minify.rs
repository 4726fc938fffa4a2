use minify_html::Cfg;

/// Collapses whitespace and strips comments from rendered HTML, including
/// inline `<style>` and `<script>` blocks.
pub fn minify_html(html: &str) -> String {
    let mut cfg = Cfg::new();
    cfg.minify_css = true;
    cfg.minify_js = true;

    let minified = minify_html::minify(html.as_bytes(), &cfg);

    String::from_utf8_lossy(&minified).into_owned()
}
