//! Built-in starter documents

#[derive(Debug, Clone, Copy)]
pub struct Template {
    pub id: &'static str,
    pub name: &'static str,
    pub html: &'static str,
}

pub const BLANK: Template = Template {
    id: "blank",
    name: "Blank Canvas",
    html: r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>New Website</title>
    <script src="https://cdn.tailwindcss.com"></script>
    <link rel="stylesheet" href="https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.4.0/css/all.min.css">
</head>
<body class="bg-white text-slate-900">
    <div class="min-h-screen flex items-center justify-center bg-slate-50 border-2 border-dashed border-slate-300 m-4 rounded-2xl">
        <div class="text-center">
            <h1 class="text-2xl font-bold text-slate-400 mb-2">Blank Canvas</h1>
            <p class="text-slate-500">Start building your website...</p>
        </div>
    </div>
</body>
</html>"#,
};

pub const SAAS_LANDING: Template = Template {
    id: "saas-landing",
    name: "SaaS Landing Page",
    html: r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>SaaS Landing Page</title>
    <script src="https://cdn.tailwindcss.com"></script>
</head>
<body class="bg-white text-slate-900">
    <header class="border-b">
        <nav class="max-w-6xl mx-auto flex items-center justify-between p-6">
            <a href="index.html" class="text-xl font-bold text-blue-600">Launchly</a>
            <a href="#pricing" class="px-4 py-2 rounded bg-blue-600 text-white">Get started</a>
        </nav>
    </header>
    <main>
        <section class="max-w-6xl mx-auto px-6 py-24 text-center">
            <h1 class="text-5xl font-extrabold mb-6">Ship your product faster</h1>
            <p class="text-lg text-slate-600 mb-8">Everything your team needs to go from idea to launch.</p>
            <img src="https://picsum.photos/1200/600" alt="Product screenshot" fetchpriority="high" class="rounded-xl aspect-video w-full object-cover">
        </section>
        <section id="pricing" class="bg-slate-50 py-20">
            <div class="max-w-6xl mx-auto px-6 grid md:grid-cols-3 gap-6">
                <div class="p-6 bg-white rounded-xl shadow"><h2 class="font-bold">Starter</h2><p>$9/mo</p></div>
                <div class="p-6 bg-white rounded-xl shadow"><h2 class="font-bold">Team</h2><p>$29/mo</p></div>
                <div class="p-6 bg-white rounded-xl shadow"><h2 class="font-bold">Enterprise</h2><p>Contact us</p></div>
            </div>
        </section>
    </main>
    <footer class="py-10 text-center text-slate-500">&copy; Launchly</footer>
</body>
</html>"##,
};

pub const PORTFOLIO_DARK: Template = Template {
    id: "portfolio-dark",
    name: "Creative Portfolio",
    html: r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Creative Portfolio</title>
    <script src="https://cdn.tailwindcss.com"></script>
</head>
<body class="bg-neutral-950 text-neutral-100">
    <header class="p-8 flex justify-between">
        <a href="index.html" class="font-semibold tracking-widest uppercase">Studio</a>
        <nav class="space-x-6 text-neutral-400"><a href="index.html">Work</a></nav>
    </header>
    <main class="px-8 grid md:grid-cols-2 gap-8">
        <img src="https://picsum.photos/800/600?1" alt="Project one" class="aspect-[4/3] w-full object-cover" fetchpriority="high">
        <img src="https://picsum.photos/800/600?2" alt="Project two" class="aspect-[4/3] w-full object-cover" loading="lazy">
    </main>
    <footer class="p-8 text-neutral-500">Available for commissions.</footer>
</body>
</html>"#,
};

pub const TEMPLATES: &[Template] = &[BLANK, SAAS_LANDING, PORTFOLIO_DARK];

/// Document used when a stored project has neither pages nor legacy html
pub const PLACEHOLDER_HTML: &str = "<!DOCTYPE html><html><body><h1>Home</h1></body></html>";

pub fn find(id: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| t.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_template_is_a_full_document() {
        for template in TEMPLATES {
            assert!(template.html.starts_with("<!DOCTYPE html>"), "{}", template.id);
        }
    }

    #[test]
    fn in_page_anchors_survive_in_template_source() {
        let saas = find("saas-landing").unwrap();
        assert!(saas.html.contains(r##"href="#pricing""##));
        for template in TEMPLATES {
            assert!(template.html.trim_end().ends_with("</html>"), "{}", template.id);
        }
    }

    #[test]
    fn find_by_id() {
        assert_eq!(find("saas-landing").map(|t| t.name), Some("SaaS Landing Page"));
        assert!(find("missing").is_none());
    }
}
