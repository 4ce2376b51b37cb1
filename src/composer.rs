use chrono::{DateTime, FixedOffset, Utc};

use crate::models::{NotificationCandidate, ReminderKind};

const FOOTER: &str = "---\n📱 Pesan otomatis dari Sistem PASTI";

/// Renders WhatsApp message bodies. Pure: output depends only on the
/// candidate, the kind and the clock reading passed in.
#[derive(Debug, Clone)]
pub struct Composer {
    display_offset: FixedOffset,
    app_url: String,
}

impl Composer {
    pub fn new(display_offset: FixedOffset, app_url: impl Into<String>) -> Self {
        let app_url = app_url.into().trim_end_matches('/').to_string();
        Self {
            display_offset,
            app_url,
        }
    }

    /// Overdue kind, or a reminder whose deadline has already slipped by
    /// between query and dispatch, gets the overdue variant.
    pub fn render(
        &self,
        candidate: &NotificationCandidate,
        kind: ReminderKind,
        now: DateTime<Utc>,
    ) -> String {
        match kind.lead_in() {
            Some(_) if candidate.deadline > now => self.render_reminder(candidate, kind),
            _ => self.render_overdue(candidate),
        }
    }

    pub fn render_reminder(&self, candidate: &NotificationCandidate, kind: ReminderKind) -> String {
        format!(
            "🔔 *REMINDER TUGAS* 🔔\n\
             \n\
             Halo {name}!\n\
             \n\
             {details}\
             ⏰ *Deadline:* {deadline} ({lead_in})\n\
             \n\
             ⚠️ Jangan lupa untuk mengumpulkan tugas ya!\n\
             \n\
             Akses Tugas Disini yaa!:\n\
             🌐 {url}/tugas\n\
             \n\
             {FOOTER}",
            name = candidate.student_name,
            details = self.details(candidate),
            deadline = self.format_deadline(candidate.deadline),
            lead_in = kind.lead_in().unwrap_or_default(),
            url = self.app_url,
        )
    }

    pub fn render_overdue(&self, candidate: &NotificationCandidate) -> String {
        format!(
            "⚠️ *TUGAS TERLAMBAT* ⚠️\n\
             \n\
             Halo {name}!\n\
             \n\
             {details}\
             ⏰ *Deadline:* {deadline} (SUDAH LEWAT)\n\
             \n\
             🚨 Tugas ini sudah melewati deadline. Segera hubungi guru pengampu \
             untuk menanyakan apakah masih bisa dikumpulkan terlambat.\n\
             \n\
             Akses sistem PASTI:\n\
             🌐 {url}/tugas-siswa\n\
             \n\
             {FOOTER}",
            name = candidate.student_name,
            details = self.details(candidate),
            deadline = self.format_deadline(candidate.deadline),
            url = self.app_url,
        )
    }

    fn details(&self, candidate: &NotificationCandidate) -> String {
        format!(
            "📚 *Tugas:* {}\n📖 *Mata Pelajaran:* {}\n🏫 *Kelas:* {}\n",
            candidate.task_title, candidate.subject_name, candidate.class_name
        )
    }

    fn format_deadline(&self, deadline: DateTime<Utc>) -> String {
        deadline
            .with_timezone(&self.display_offset)
            .format("%d %b %Y %H:%M")
            .to_string()
    }
}
