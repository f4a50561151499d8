// src/generator.rs
use crate::core::config_manager::SiteConfig;
use crate::core::FsOps;
use crate::template_processor::{self as tpl, Bindings, TemplateProcessor};
use crate::types::EnrichedJob;
use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, info};

pub const FALLBACK_DATE: &str = "2025-01-01";
const LEGAL_PAGES: [&str; 2] = ["impressum.html", "datenschutz.html"];

#[derive(Debug, Clone, Default, Serialize)]
pub struct SiteOutput {
    pub job_pages: usize,
    pub tag_pages: usize,
    pub legal_pages: usize,
    pub sitemap_urls: usize,
    pub files_written: usize,
}

/// A rendered file, relative to the output directory.
#[derive(Debug, Clone)]
pub struct Page {
    pub file_name: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<String>,
}

pub struct SiteGenerator {
    pub config: SiteConfig,
    year: i32,
}

impl SiteGenerator {
    pub fn new(config: SiteConfig) -> Self {
        Self {
            config,
            year: Utc::now().year(),
        }
    }

    /// Render every page and write it below the configured output directory.
    pub async fn generate(&self, jobs: &[EnrichedJob], top_tags: &[String]) -> Result<SiteOutput> {
        let output_dir = &self.config.output_dir;
        FsOps::ensure_dir_exists(output_dir)
            .await
            .with_context(|| format!("Cannot prepare output directory {}", output_dir.display()))?;

        let (pages, output) = self.render_site(jobs, top_tags);

        for page in &pages {
            let path: PathBuf = output_dir.join(&page.file_name);
            FsOps::write_file_safe(&path, &page.content).await?;
        }

        info!(
            job_pages = output.job_pages,
            tag_pages = output.tag_pages,
            "Site written to {}",
            output_dir.display()
        );

        Ok(SiteOutput {
            files_written: pages.len(),
            ..output
        })
    }

    /// Pure rendering step: all pages including the sitemap.
    pub fn render_site(&self, jobs: &[EnrichedJob], top_tags: &[String]) -> (Vec<Page>, SiteOutput) {
        let mut pages = Vec::new();
        let mut sitemap = vec![SitemapEntry {
            loc: format!("{}/", self.base_url()),
            lastmod: None,
        }];
        let mut output = SiteOutput::default();

        let job_files = assign_job_file_names(jobs);
        for (job, file_name) in jobs.iter().zip(&job_files) {
            pages.push(Page {
                file_name: file_name.clone(),
                content: self.render_job_page(job),
            });
            sitemap.push(SitemapEntry {
                loc: format!("{}/{}", self.base_url(), file_name),
                lastmod: Some(job.job.posted_date().unwrap_or(FALLBACK_DATE).to_string()),
            });
            output.job_pages += 1;
        }

        let tag_links = tag_links(top_tags);
        pages.push(Page {
            file_name: "index.html".to_string(),
            content: self.render_listing(
                "Finde deinen Traumjob.",
                &format!(
                    "Durchsuche {} aktuelle Stellenangebote aus Deutschland & Remote.",
                    jobs.len()
                ),
                jobs.iter().zip(&job_files),
                &tag_links,
            ),
        });

        for (tag, file_name) in &tag_links {
            let tagged: Vec<(&EnrichedJob, &String)> = jobs
                .iter()
                .zip(&job_files)
                .filter(|(job, _)| job.job.tags.iter().any(|t| t.trim() == tag.as_str()))
                .collect();
            let count = tagged.len();
            pages.push(Page {
                file_name: file_name.clone(),
                content: self.render_listing(
                    &format!("{} Jobs", tag),
                    &format!("{} aktuelle Stellenangebote mit dem Schwerpunkt {}.", count, tag),
                    tagged.into_iter(),
                    &tag_links,
                ),
            });
            sitemap.push(SitemapEntry {
                loc: format!("{}/{}", self.base_url(), file_name),
                lastmod: None,
            });
            output.tag_pages += 1;
        }

        for (file_name, (title, body)) in LEGAL_PAGES
            .iter()
            .zip([("Impressum", tpl::IMPRESSUM), ("Datenschutz", tpl::DATENSCHUTZ)])
        {
            pages.push(Page {
                file_name: file_name.to_string(),
                content: self.render_legal(title, body),
            });
            sitemap.push(SitemapEntry {
                loc: format!("{}/{}", self.base_url(), file_name),
                lastmod: None,
            });
            output.legal_pages += 1;
        }

        output.sitemap_urls = sitemap.len();
        pages.push(Page {
            file_name: "sitemap.xml".to_string(),
            content: render_sitemap(&sitemap),
        });

        debug!("Rendered {} pages", pages.len());
        (pages, output)
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn layout(
        &self,
        page_title: &str,
        meta_description: &str,
        head_extra: String,
        nav_action: &str,
        body: String,
    ) -> String {
        let bindings = Bindings::from([
            ("page_title", TemplateProcessor::escape_html(page_title)),
            ("meta_description", TemplateProcessor::escape_html(meta_description)),
            ("css", tpl::STYLE.to_string()),
            ("head_extra", head_extra),
            ("site_name", TemplateProcessor::escape_html(&self.config.site_name)),
            ("nav_action", nav_action.to_string()),
            ("body", body),
            ("year", self.year.to_string()),
        ]);
        TemplateProcessor::render(tpl::LAYOUT, &bindings)
    }

    fn render_job_page(&self, enriched: &EnrichedJob) -> String {
        let job = &enriched.job;
        let esc = TemplateProcessor::escape_html;

        let apply_url = if job.url.trim().is_empty() {
            "#".to_string()
        } else {
            esc(job.url.trim())
        };
        let remote_badge = if job.remote {
            r#"<span class="badge badge-remote">🏠 Remote möglich</span>"#
        } else {
            r#"<span class="badge badge-office">🏢 Vor Ort</span>"#
        };
        let description_html = if job.description.trim().is_empty() {
            "<p>Keine Beschreibung verfügbar.</p>".to_string()
        } else {
            job.description.clone()
        };

        let body = TemplateProcessor::render(
            tpl::JOB_PAGE,
            &Bindings::from([
                ("title", esc(&job.title)),
                ("company", esc(&job.company_name)),
                ("location", esc(&job.location)),
                ("salary_estimate", esc(&enriched.salary_estimate)),
                ("summary", esc(&enriched.summary)),
                ("remote_badge", remote_badge.to_string()),
                ("description_html", description_html),
                ("apply_url", apply_url),
            ]),
        );

        let json_ld = TemplateProcessor::render(
            tpl::JOB_POSTING_SCRIPT,
            &Bindings::from([("json", self.job_posting_json(enriched))]),
        );

        self.layout(
            &format!("{} bei {} | {}", job.title, job.company_name, self.config.site_name),
            &format!(
                "Jobangebot: {} in {}. Jetzt bewerben bei {}.",
                job.title, job.location, job.company_name
            ),
            json_ld,
            r#"<a href="index.html" role="button" class="outline">⬅ Zurück</a>"#,
            body,
        )
    }

    /// schema.org JobPosting, safe to embed in a script tag.
    fn job_posting_json(&self, enriched: &EnrichedJob) -> String {
        let job = &enriched.job;
        let excerpt = format!("{}...", TemplateProcessor::text_excerpt(&job.description, 200));
        let value = serde_json::json!({
            "@context": "https://schema.org/",
            "@type": "JobPosting",
            "title": job.title,
            "description": excerpt,
            "hiringOrganization": {
                "@type": "Organization",
                "name": job.company_name,
            },
            "jobLocation": {
                "@type": "Place",
                "address": {
                    "@type": "PostalAddress",
                    "addressLocality": job.location,
                    "addressCountry": "DE",
                }
            },
            "datePosted": job.posted_date().unwrap_or(FALLBACK_DATE),
            "employmentType": "FULL_TIME",
        });
        serde_json::to_string_pretty(&value)
            .unwrap_or_default()
            .replace("</", "<\\/")
    }

    fn render_listing<'j, I>(
        &self,
        heading: &str,
        subheading: &str,
        jobs: I,
        tag_links: &[(String, String)],
    ) -> String
    where
        I: Iterator<Item = (&'j EnrichedJob, &'j String)>,
    {
        let esc = TemplateProcessor::escape_html;

        let cards: String = jobs
            .map(|(enriched, file_name)| {
                let job = &enriched.job;
                let badge = if job.remote {
                    r#"<span class="badge badge-remote">Remote</span>"#
                } else {
                    ""
                };
                TemplateProcessor::render(
                    tpl::JOB_CARD,
                    &Bindings::from([
                        ("href", esc(file_name)),
                        ("title", esc(&job.title)),
                        ("badge", badge.to_string()),
                        ("company", esc(&job.company_name)),
                        ("location", esc(&job.location)),
                        ("salary_estimate", esc(&enriched.salary_estimate)),
                    ]),
                )
            })
            .collect();

        let tag_nav: String = tag_links
            .iter()
            .map(|(tag, file_name)| format!(r##"<a href="{}">#{}</a>"##, esc(file_name), esc(tag)))
            .collect::<Vec<_>>()
            .join("\n            ");

        let body = TemplateProcessor::render(
            tpl::LISTING_PAGE,
            &Bindings::from([
                ("heading", esc(heading)),
                ("subheading", esc(subheading)),
                ("tag_nav", tag_nav),
                ("cards", cards),
            ]),
        );

        self.layout(
            &format!("{} - {}", heading, self.config.site_name),
            subheading,
            tpl::FILTER_SCRIPT.to_string(),
            r#"<a href="index.html" role="button" class="secondary outline">Alle Jobs</a>"#,
            body,
        )
    }

    fn render_legal(&self, title: &str, template: &str) -> String {
        let body = TemplateProcessor::render(
            template,
            &Bindings::from([(
                "site_name",
                TemplateProcessor::escape_html(&self.config.site_name),
            )]),
        );
        self.layout(
            &format!("{} - {}", title, self.config.site_name),
            title,
            String::new(),
            r#"<a href="index.html" role="button" class="outline">⬅ Zurück</a>"#,
            body,
        )
    }
}

/// One unique `.html` file name per job, derived from its id.
pub fn assign_job_file_names(jobs: &[EnrichedJob]) -> Vec<String> {
    let mut used = HashSet::new();
    jobs.iter()
        .enumerate()
        .map(|(i, enriched)| {
            let mut stem = FsOps::slugify(&enriched.job.id);
            if stem.is_empty() {
                stem = format!("job-{}", i);
            }
            let mut candidate = stem.clone();
            let mut n = 2;
            while !used.insert(candidate.clone()) {
                candidate = format!("{}-{}", stem, n);
                n += 1;
            }
            format!("{}.html", candidate)
        })
        .collect()
}

/// `(tag, file name)` for each top tag that yields a usable, unique slug.
fn tag_links(top_tags: &[String]) -> Vec<(String, String)> {
    let mut used = HashSet::new();
    top_tags
        .iter()
        .filter_map(|tag| {
            let slug = FsOps::slugify(tag);
            if slug.is_empty() || !used.insert(slug.clone()) {
                debug!("Skipping tag page for {:?}", tag);
                return None;
            }
            Some((tag.trim().to_string(), format!("tag-{}.html", slug)))
        })
        .collect()
}

pub fn render_sitemap(entries: &[SitemapEntry]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");
    for entry in entries {
        xml.push_str("  <url><loc>");
        xml.push_str(&TemplateProcessor::escape_html(&entry.loc));
        xml.push_str("</loc>");
        if let Some(lastmod) = &entry.lastmod {
            xml.push_str("<lastmod>");
            xml.push_str(&TemplateProcessor::escape_html(lastmod));
            xml.push_str("</lastmod>");
        }
        xml.push_str("<changefreq>daily</changefreq></url>\n");
    }
    xml.push_str("</urlset>");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EnrichmentResult, EnrichmentSource, JobRecord};

    fn site() -> SiteGenerator {
        SiteGenerator::new(SiteConfig {
            base_url: "https://jobs.example/".to_string(),
            ..Default::default()
        })
    }

    fn enriched(id: &str, tags: &[&str]) -> EnrichedJob {
        let mut job = JobRecord::new(id, format!("Title {}", id))
            .with_tags(tags.iter().copied())
            .with_description("<p>Hello <script>x</script></p>");
        job.created_at = Some("2025-02-03T00:00:00Z".to_string());
        EnrichedJob::new(
            job,
            EnrichmentResult {
                salary_estimate: "50k <b>".to_string(),
                summary: "Kurz & gut".to_string(),
            },
            EnrichmentSource::Fresh,
        )
    }

    fn page<'p>(pages: &'p [Page], name: &str) -> &'p Page {
        pages
            .iter()
            .find(|p| p.file_name == name)
            .unwrap_or_else(|| panic!("missing page {}", name))
    }

    #[test]
    fn test_render_site_page_set() {
        let jobs = vec![enriched("a", &["rust"]), enriched("b", &["go", "rust"])];
        let tags = vec!["rust".to_string(), "go".to_string()];
        let (pages, output) = site().render_site(&jobs, &tags);

        let names: Vec<&str> = pages.iter().map(|p| p.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "a.html",
                "b.html",
                "index.html",
                "tag-rust.html",
                "tag-go.html",
                "impressum.html",
                "datenschutz.html",
                "sitemap.xml"
            ]
        );
        assert_eq!(output.job_pages, 2);
        assert_eq!(output.tag_pages, 2);
        assert_eq!(output.legal_pages, 2);
        // root + 2 jobs + 2 tags + 2 legal
        assert_eq!(output.sitemap_urls, 7);
    }

    #[test]
    fn test_job_page_content_is_escaped_except_description() {
        let jobs = vec![enriched("a", &[])];
        let (pages, _) = site().render_site(&jobs, &[]);
        let html = &page(&pages, "a.html").content;

        assert!(html.contains("50k &lt;b&gt;"));
        assert!(html.contains("Kurz &amp; gut"));
        assert!(html.contains("<p>Hello <script>x</script></p>"));
        assert!(html.contains("\"@type\": \"JobPosting\""));
        assert!(html.contains("\"datePosted\": \"2025-02-03\""));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_tag_page_lists_only_tagged_jobs() {
        let jobs = vec![enriched("a", &["rust"]), enriched("b", &["go"])];
        let tags = vec!["go".to_string()];
        let (pages, _) = site().render_site(&jobs, &tags);
        let html = &page(&pages, "tag-go.html").content;

        assert!(html.contains("href=\"b.html\""));
        assert!(!html.contains("href=\"a.html\""));
        assert!(page(&pages, "index.html").content.contains("href=\"tag-go.html\""));
    }

    #[test]
    fn test_sitemap_dates_and_fallback() {
        let mut undated = enriched("c", &[]);
        undated.job.created_at = None;
        let jobs = vec![enriched("a", &[]), undated];
        let (pages, _) = site().render_site(&jobs, &[]);
        let xml = &page(&pages, "sitemap.xml").content;

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<loc>https://jobs.example/</loc>"));
        assert!(xml.contains("<loc>https://jobs.example/a.html</loc><lastmod>2025-02-03</lastmod>"));
        assert!(xml.contains("<loc>https://jobs.example/c.html</loc><lastmod>2025-01-01</lastmod>"));
        assert!(xml.contains("<loc>https://jobs.example/impressum.html</loc>"));
        assert!(xml.ends_with("</urlset>"));
    }

    #[test]
    fn test_job_file_names_are_unique() {
        let jobs = vec![enriched("Same Id", &[]), enriched("same-id", &[]), enriched("???", &[])];
        assert_eq!(
            assign_job_file_names(&jobs),
            vec!["same-id.html", "same-id-2.html", "job-2.html"]
        );
    }

    #[test]
    fn test_empty_board_is_still_a_valid_site() {
        let (pages, output) = site().render_site(&[], &[]);
        assert_eq!(output.job_pages, 0);
        assert_eq!(pages.len(), 4);
        assert!(page(&pages, "index.html").content.contains("Durchsuche 0 aktuelle"));
    }

    #[tokio::test]
    async fn test_generate_writes_files() {
        let dir = std::env::temp_dir().join(format!("jobradar-site-{}", uuid::Uuid::new_v4()));
        let generator = SiteGenerator::new(SiteConfig {
            output_dir: dir.clone(),
            ..Default::default()
        });

        let output = generator
            .generate(&[enriched("a", &["rust"])], &["rust".to_string()])
            .await
            .unwrap();

        assert_eq!(output.files_written, 6);
        assert!(dir.join("a.html").exists());
        assert!(dir.join("tag-rust.html").exists());
        assert!(dir.join("sitemap.xml").exists());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
