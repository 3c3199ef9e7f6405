pub mod calendar;
pub mod domain;
pub mod ports;

pub use domain::{
    CareReport, CareReportDraft, ChatTurn, ConversationLog, DailyCareScore, DailySummary,
    DayConversations, DayStatus, DiagnosisLog, DiagnosisOutcome, DiagnosisReport,
    DiagnosisReportDraft, DiagnosisScores, DiagnosisStatistics, EmailAttachment,
    NewConversationLog, NewDiagnosisLog, NewUser, OutgoingEmail, ProfileUpdate, ReportContent,
    ReportKind, ReportLog, ReportPeriod, RiskLevel, SubscriptionTier, User, UserCredentials,
    WeeklyStatus,
};
pub use ports::{
    CareAssistantService, DatabaseService, EmailSender, PortError, PortResult,
    ReportGenerationService, TextToSpeechService,
};
