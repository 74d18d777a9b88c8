use serde_json::Value;

/// Static description of one exposed tool.
#[derive(Clone, Debug)]
pub struct ToolCatalogEntry {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

pub fn tool_catalog() -> Vec<ToolCatalogEntry> {
    vec![
        ToolCatalogEntry {
            name: "scrape",
            title: "Scrape Page",
            description: "Fetch a single web page with automatic strategy fallback, clean it to Markdown, \
                optionally run an LLM extraction query, and cache the result. Returns cached content when a \
                fresh enough copy exists.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "Absolute http(s) URL to fetch"},
                    "timeout": {"type": "integer", "minimum": 1, "default": 60000, "description": "Per-request timeout in milliseconds"},
                    "maxChars": {"type": "integer", "minimum": 1, "default": 100000, "description": "Character window size for the returned payload"},
                    "startIndex": {"type": "integer", "minimum": 0, "default": 0, "description": "Character offset to continue a paginated read"},
                    "resultHandling": {"type": "string", "enum": ["saveOnly", "saveAndReturn", "returnOnly"], "default": "saveAndReturn"},
                    "forceRescrape": {"type": "boolean", "default": false, "description": "Bypass the cache and re-fetch"},
                    "cleanScrape": {"type": "boolean", "default": true, "description": "Convert HTML to Markdown"},
                    "maxAge": {"type": "integer", "minimum": 0, "default": 172800000, "description": "Maximum cache-entry age in milliseconds to accept"},
                    "proxy": {"type": "string", "enum": ["basic", "stealth", "auto"], "default": "auto"},
                    "blockAds": {"type": "boolean", "default": true},
                    "headers": {"type": "object", "additionalProperties": {"type": "string"}},
                    "waitFor": {"type": "integer", "minimum": 0, "description": "Milliseconds the vendor waits for the page to settle"},
                    "includeTags": {"type": "array", "items": {"type": "string"}, "description": "CSS selectors to keep (whitelist)"},
                    "excludeTags": {"type": "array", "items": {"type": "string"}, "description": "CSS selectors to strip first"},
                    "formats": {"type": "array", "items": {"type": "string", "enum": ["markdown", "html", "rawHtml", "links", "images", "screenshot", "summary", "branding"]}, "default": ["markdown", "html"]},
                    "onlyMainContent": {"type": "boolean", "default": true},
                    "actions": {"type": "array", "items": {"type": "object"}, "description": "Ordered browser actions executed by the vendor before capture"},
                    "extract": {"type": "string", "description": "Free-text query answered from the page by the configured LLM"},
                    "location": {"type": "object", "properties": {"country": {"type": "string"}, "languages": {"type": "array", "items": {"type": "string"}}}}
                },
                "required": ["url"]
            }),
        },
        ToolCatalogEntry {
            name: "map",
            title: "Map Site URLs",
            description: "Discover URLs reachable from a starting page (optionally via its sitemap) and return \
                them as a paginated list. Useful to pick targets before scraping or crawling.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "Seed http(s) URL"},
                    "search": {"type": "string", "description": "Filter discovered URLs by relevance to this query"},
                    "limit": {"type": "integer", "minimum": 1, "maximum": 100000, "default": 5000, "description": "Upstream discovery bound"},
                    "sitemap": {"type": "string", "enum": ["skip", "include", "only"], "default": "include"},
                    "includeSubdomains": {"type": "boolean", "default": false},
                    "ignoreQueryParameters": {"type": "boolean", "default": false},
                    "timeout": {"type": "integer", "minimum": 1},
                    "location": {"type": "object", "properties": {"country": {"type": "string"}, "languages": {"type": "array", "items": {"type": "string"}}}},
                    "startIndex": {"type": "integer", "minimum": 0, "default": 0},
                    "maxResults": {"type": "integer", "minimum": 1, "maximum": 5000, "description": "Page size of the returned window"},
                    "resultHandling": {"type": "string", "enum": ["saveOnly", "saveAndReturn", "returnOnly"], "default": "saveAndReturn"}
                },
                "required": ["url"]
            }),
        },
        ToolCatalogEntry {
            name: "crawl",
            title: "Crawl Website",
            description: "Manage a multi-page crawl job run by the upstream service. Pass `url` to start a job, \
                `jobId` to poll its status, or `jobId` with `cancel: true` to cancel it. Exactly one of `url` or \
                `jobId` must be provided.",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "url": {"type": "string", "description": "Seed http(s) URL — starts a new job"},
                    "limit": {"type": "integer", "minimum": 1, "maximum": 100000, "default": 100, "description": "Maximum pages the job may scrape"},
                    "maxDiscoveryDepth": {"type": "integer", "minimum": 1},
                    "includePaths": {"type": "array", "items": {"type": "string"}},
                    "excludePaths": {"type": "array", "items": {"type": "string"}},
                    "allowSubdomains": {"type": "boolean", "default": false},
                    "crawlEntireDomain": {"type": "boolean", "default": false},
                    "jobId": {"type": "string", "description": "Existing job — polls status (or cancels with `cancel`)"},
                    "cancel": {"type": "boolean", "default": false}
                }
            }),
        },
        ToolCatalogEntry {
            name: "read_resource",
            title: "Read Stored Resource",
            description: "Read a stored resource by URI: scraped tiers under pulse-fetch://scraped/... and map \
                result pages under pulse-crawl://map/....",
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "uri": {"type": "string", "description": "Resource URI returned by a previous scrape or map call"}
                },
                "required": ["uri"]
            }),
        },
    ]
}
