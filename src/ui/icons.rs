pub struct Icons;

impl Icons {
    pub const CHECK: &str = "✅";
    pub const CROSS: &str = "❌";
    pub const WARN: &str = "⚠️";
    pub const PERSON: &str = "👤";
    pub const PHONE: &str = "📞";
    pub const DATABASE: &str = "🗄️";
    pub const DEL: &str = "🗑️";
    pub const STATS: &str = "📊";
}
