//! Deterministic fallback content keyed by canonical topic and framework.
//!
//! Everything here is data. Adding a topic means adding a [`TopicProfile`]
//! row; the normalization code never branches on a topic name.

use explainer_shared::{Framework, canonical_topic};

/// Canned content used when the model's answer is missing or unusable.
#[derive(Debug)]
pub struct TopicProfile {
    pub topic: &'static str,
    /// Structural requirement appended to the synthesis prompt.
    pub code_rule: &'static str,
    pub explanation: &'static str,
    pub line_by_line: &'static [&'static str],
    pub code: &'static str,
    /// Topic page in the FastAPI docs, used when no other framework applies.
    pub doc_url: &'static str,
}

pub const TOPIC_PROFILES: &[TopicProfile] = &[
    TopicProfile {
        topic: "websocket",
        code_rule: "code_example MUST include: WebSocket route (@app.websocket), \
                    websocket.accept(), receive_text(), send_text(), WebSocketDisconnect handler.",
        explanation: "A WebSocket opens a persistent, bidirectional connection between client \
                      and server. In FastAPI you declare an endpoint with @app.websocket and \
                      drive the accept / receive / send cycle yourself.",
        line_by_line: &[
            "Create the app instance with app = FastAPI().",
            "Define a WebSocket route with @app.websocket('/ws').",
            "Accept the incoming connection with await websocket.accept().",
            "Receive messages using await websocket.receive_text().",
            "Send responses using await websocket.send_text(...).",
            "Handle disconnects with WebSocketDisconnect exception.",
        ],
        code: r#"from fastapi import FastAPI, WebSocket, WebSocketDisconnect

app = FastAPI()

@app.websocket("/ws")
async def websocket_endpoint(websocket: WebSocket):
    await websocket.accept()
    try:
        while True:
            msg = await websocket.receive_text()
            await websocket.send_text(f"echo: {msg}")
    except WebSocketDisconnect:
        pass

# Run: uvicorn main:app --reload"#,
        doc_url: "https://fastapi.tiangolo.com/advanced/websockets/",
    },
    TopicProfile {
        topic: "dependency_injection",
        code_rule: "code_example MUST include: a dependency function, Depends() in a route \
                    parameter, and at least one route that uses the dependency.",
        explanation: "Dependency injection hands shared needs such as a DB session, the \
                      current user or settings to route handlers through a mechanism like \
                      Depends(). It removes duplicated setup code and makes handlers easy to test.",
        line_by_line: &[
            "Define a dependency function that returns what you need.",
            "Use Depends(your_dependency) to inject it into a route.",
            "FastAPI runs the dependency before the route handler.",
            "Dependencies can be nested (dependency depends on another).",
            "Use yield for setup/teardown (e.g., DB session close).",
            "Use async dependencies for I/O operations.",
        ],
        code: r#"from fastapi import Depends, FastAPI

app = FastAPI()

def common_parameters(q: str | None = None, skip: int = 0, limit: int = 100) -> dict:
    return {"q": q, "skip": skip, "limit": limit}

@app.get("/items/")
async def read_items(commons: dict = Depends(common_parameters)):
    return commons

@app.get("/users/")
async def read_users(commons: dict = Depends(common_parameters)):
    return commons

# Run: uvicorn main:app --reload"#,
        doc_url: "https://fastapi.tiangolo.com/tutorial/dependencies/",
    },
    TopicProfile {
        topic: "authentication",
        code_rule: "code_example MUST include: token/JWT validation, a protected route, \
                    HTTPException with 401 status for unauthorized access.",
        explanation: "Authentication verifies the identity of whoever calls the API. Requests \
                      usually carry a Bearer token or JWT that is validated before the handler \
                      runs, and unauthenticated calls receive a 401 response.",
        line_by_line: &[
            "Define a security scheme (Bearer/API key/OAuth2).",
            "Create a function to read and validate the token.",
            "Protect routes by injecting the dependency.",
            "Return 401 when invalid/missing credentials.",
            "Never store plaintext passwords; hash them.",
            "Use short-lived tokens + refresh tokens.",
        ],
        code: r#"from fastapi import FastAPI, Depends, HTTPException, status
from fastapi.security import OAuth2PasswordBearer

app = FastAPI()
oauth2_scheme = OAuth2PasswordBearer(tokenUrl="token")

def verify_token(token: str) -> str:
    if token != "secret-token":
        raise HTTPException(status_code=status.HTTP_401_UNAUTHORIZED, detail="Invalid token")
    return "user@example.com"

@app.get("/protected")
def protected_route(token: str = Depends(oauth2_scheme)):
    user = verify_token(token)
    return {"user": user, "message": "Access granted"}

# Run: uvicorn main:app --reload"#,
        doc_url: "https://fastapi.tiangolo.com/tutorial/security/",
    },
    TopicProfile {
        topic: "rest_api",
        code_rule: "code_example MUST include: FastAPI(), at least one HTTP route \
                    (@app.get or @app.post), proper return value or Pydantic model.",
        explanation: "A REST API exposes resources through HTTP methods such as GET, POST, PUT \
                      and DELETE. You declare routes in the framework and return JSON responses.",
        line_by_line: &[
            "Create the app instance.",
            "Define routes with method decorators.",
            "Use path params for resource IDs.",
            "Use query params for optional filters.",
            "Return dict/Pydantic model so it serializes to JSON.",
            "Raise HTTPException for proper HTTP error codes.",
        ],
        code: r#"from fastapi import FastAPI, HTTPException
from pydantic import BaseModel

app = FastAPI()

class Item(BaseModel):
    name: str
    price: float

items: dict[int, dict] = {}

@app.get("/items/{item_id}")
def get_item(item_id: int):
    if item_id not in items:
        raise HTTPException(status_code=404, detail="Item not found")
    return items[item_id]

@app.post("/items/{item_id}")
def create_item(item_id: int, item: Item):
    items[item_id] = item.model_dump()
    return items[item_id]

# Run: uvicorn main:app --reload"#,
        doc_url: "https://fastapi.tiangolo.com/tutorial/first-steps/",
    },
    TopicProfile {
        topic: "middleware",
        code_rule: "code_example MUST include: @app.middleware decorator or \
                    app.add_middleware(), request/response handling.",
        explanation: "Middleware wraps every request before it reaches a route and every \
                      response before it is sent. It is the place for cross-cutting concerns \
                      such as timing, logging or CORS headers.",
        line_by_line: &[
            "Create the app instance.",
            "Register a function with @app.middleware('http').",
            "Receive the request and the call_next callable.",
            "Await call_next(request) to run the route handler.",
            "Modify the response, for example by adding a header.",
            "Return the response so it reaches the client.",
        ],
        code: r#"import time

from fastapi import FastAPI, Request

app = FastAPI()

@app.middleware("http")
async def add_process_time_header(request: Request, call_next):
    start = time.perf_counter()
    response = await call_next(request)
    response.headers["X-Process-Time"] = f"{time.perf_counter() - start:.4f}"
    return response

@app.get("/")
async def root():
    return {"message": "hello"}

# Run: uvicorn main:app --reload"#,
        doc_url: "https://fastapi.tiangolo.com/tutorial/middleware/",
    },
    TopicProfile {
        topic: "database",
        code_rule: "code_example MUST include: database session setup, \
                    a model definition, and a route that queries the database.",
        explanation: "Database access pairs a session or connection with model definitions \
                      and hands a session to each request. The session is opened per request \
                      and closed when the handler finishes.",
        line_by_line: &[
            "Create the engine with the database URL.",
            "Define a session factory bound to the engine.",
            "Declare a model class mapped to a table.",
            "Yield a session from a dependency and close it afterwards.",
            "Inject the session into a route with Depends().",
            "Query the model inside the route and return the rows.",
        ],
        code: r#"from fastapi import Depends, FastAPI
from sqlalchemy import Column, Integer, String, create_engine
from sqlalchemy.orm import Session, declarative_base, sessionmaker

engine = create_engine("sqlite:///./app.db", connect_args={"check_same_thread": False})
SessionLocal = sessionmaker(bind=engine)
Base = declarative_base()

class User(Base):
    __tablename__ = "users"
    id = Column(Integer, primary_key=True)
    name = Column(String, nullable=False)

Base.metadata.create_all(bind=engine)
app = FastAPI()

def get_db():
    db = SessionLocal()
    try:
        yield db
    finally:
        db.close()

@app.get("/users")
def list_users(db: Session = Depends(get_db)):
    return [{"id": u.id, "name": u.name} for u in db.query(User).all()]

# Run: uvicorn main:app --reload"#,
        doc_url: "https://fastapi.tiangolo.com/tutorial/sql-databases/",
    },
];

/// Padding pool for `best_practices`.
pub const GENERIC_BEST_PRACTICES: &[&str] = &[
    "Handle disconnects and exceptions gracefully.",
    "Avoid blocking calls; keep handlers async-friendly.",
    "Add rate limiting / connection limits for safety.",
    "Use clear message formats (e.g., JSON messages) for clients.",
];

/// Documentation root per framework.
const FRAMEWORK_DOCS: &[(Framework, &str)] = &[
    (Framework::Fastapi, "https://fastapi.tiangolo.com"),
    (Framework::Django, "https://docs.djangoproject.com"),
    (Framework::Flask, "https://flask.palletsprojects.com"),
    (Framework::React, "https://react.dev"),
];

const DEFAULT_DOCS: &str = "https://docs.python.org";

/// Look up the profile for a topic, applying aliases first.
pub fn profile(topic: &str) -> Option<&'static TopicProfile> {
    let topic = canonical_topic(topic);
    TOPIC_PROFILES.iter().find(|p| p.topic == topic)
}

/// Structural rule for the synthesis prompt.
pub fn code_rule(topic: &str, framework: Framework) -> String {
    match profile(topic) {
        Some(p) => p.code_rule.to_string(),
        None => format!(
            "code_example MUST be a complete, self-contained {framework} example that directly \
             answers the user question."
        ),
    }
}

pub fn explanation(topic: &str, framework: Framework) -> String {
    match profile(topic) {
        Some(p) => p.explanation.to_string(),
        None => format!(
            "No explanation could be generated for this {framework} topic; an example and \
             notes are provided instead."
        ),
    }
}

/// Six-step padding pool for `line_by_line`.
pub fn line_by_line(topic: &str, framework: Framework) -> Vec<String> {
    match profile(topic) {
        Some(p) => p.line_by_line.iter().map(|s| s.to_string()).collect(),
        None => vec![
            format!("Import the necessary {framework} modules."),
            "Initialize the application instance.".into(),
            "Define the core handler logic.".into(),
            "Handle inputs and validation.".into(),
            "Return the appropriate response.".into(),
            "Add error handling.".into(),
        ],
    }
}

pub fn code_example(topic: &str, framework: Framework) -> String {
    match profile(topic) {
        Some(p) => p.code.to_string(),
        None => format!(
            "# No fallback example available for topic: {topic}\n\
             # Please refer to the {framework} documentation."
        ),
    }
}

/// Canonical documentation URL for a framework/topic pair.
///
/// A known non-FastAPI framework gets its documentation root. Otherwise the
/// topic's FastAPI page is used, then the FastAPI root, then the Python docs.
pub fn canonical_doc_url(framework: Framework, topic: &str) -> &'static str {
    let framework_root = FRAMEWORK_DOCS
        .iter()
        .find(|(fw, _)| *fw == framework)
        .map(|(_, url)| *url);

    match framework {
        Framework::Fastapi | Framework::Unknown => profile(topic)
            .map(|p| p.doc_url)
            .or(framework_root)
            .unwrap_or(DEFAULT_DOCS),
        _ => framework_root.unwrap_or(DEFAULT_DOCS),
    }
}
