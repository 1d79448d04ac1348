//! Upload page
//!
//! A single HTML page with vanilla JS: upload a file, list the separated stems, trigger
//! speaker separation and the bundle download.

use axum::{
    response::{Html, IntoResponse},
    routing::get,
    Router,
};

use crate::AppState;

/// Build UI routes
pub fn ui_routes() -> Router<AppState> {
    Router::new().route("/", get(upload_page))
}

async fn upload_page() -> impl IntoResponse {
    Html(
        r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>StemDesk - Source Separation</title>
    <style>
        body {
            font-family: system-ui, -apple-system, sans-serif;
            max-width: 800px;
            margin: 40px auto;
            padding: 20px;
            line-height: 1.6;
        }
        h1 {
            color: #333;
            border-bottom: 2px solid #0066cc;
            padding-bottom: 10px;
        }
        .button {
            display: inline-block;
            padding: 10px 20px;
            background: #0066cc;
            color: white;
            border: none;
            border-radius: 4px;
            margin: 10px 5px;
            cursor: pointer;
        }
        .button:hover {
            background: #0052a3;
        }
        .button:disabled {
            background: #999;
        }
        #status { color: #555; }
        .error { color: #b00020; }
        ul { padding-left: 20px; }
    </style>
</head>
<body>
    <h1>StemDesk</h1>
    <p>Upload a recording to split it into bass, vocal, drum and music stems.</p>

    <form id="upload-form">
        <input type="file" name="file" id="file" accept="audio/*">
        <button type="submit" class="button" id="upload-button">Separate</button>
    </form>
    <p id="status"></p>

    <div id="results" hidden>
        <h2>Stems</h2>
        <ul id="stems"></ul>
        <button class="button" id="speakers-button">Separate speakers</button>
        <button class="button" id="bundle-button">Download all</button>
        <h2 id="speakers-title" hidden>Speakers</h2>
        <ul id="speakers"></ul>
    </div>

    <script>
        let session = null;
        const status = document.getElementById('status');

        function scoped(path) {
            return session ? `${path}?session=${session}` : path;
        }

        function setStatus(text, isError) {
            status.textContent = text;
            status.className = isError ? 'error' : '';
        }

        function link(name) {
            const li = document.createElement('li');
            const a = document.createElement('a');
            a.href = scoped(`/download/${encodeURIComponent(name)}`);
            a.textContent = name;
            li.appendChild(a);
            return li;
        }

        document.getElementById('upload-form').addEventListener('submit', async (event) => {
            event.preventDefault();
            const input = document.getElementById('file');
            if (!input.files.length) {
                setStatus('Choose a file first.', true);
                return;
            }
            const body = new FormData();
            body.append('file', input.files[0]);
            document.getElementById('upload-button').disabled = true;
            setStatus('Processing, this can take several minutes...');
            try {
                const response = await fetch('/upload', { method: 'POST', body });
                const data = await response.json();
                if (!data.success) {
                    setStatus(data.error, true);
                    return;
                }
                session = data.session_id;
                const stems = document.getElementById('stems');
                stems.innerHTML = '';
                data.files.forEach((name) => stems.appendChild(link(name)));
                document.getElementById('results').hidden = false;
                setStatus(`${data.succeeded_chunks} of ${data.total_chunks} chunks separated.`);
            } catch (err) {
                setStatus(`Upload failed: ${err}`, true);
            } finally {
                document.getElementById('upload-button').disabled = false;
            }
        });

        document.getElementById('speakers-button').addEventListener('click', async () => {
            setStatus('Detecting speakers...');
            const response = await fetch(scoped('/separate_speakers'), { method: 'POST' });
            const data = await response.json();
            if (!data.success) {
                setStatus(data.error, true);
                return;
            }
            const speakers = document.getElementById('speakers');
            speakers.innerHTML = '';
            Object.values(data.speaker_files).forEach((name) => speakers.appendChild(link(name)));
            document.getElementById('speakers-title').hidden = false;
            setStatus(`${Object.keys(data.speaker_files).length} speaker(s) found.`);
        });

        document.getElementById('bundle-button').addEventListener('click', () => {
            window.location = scoped('/download_all');
        });
    </script>
</body>
</html>
"#,
    )
}
